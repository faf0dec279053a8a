use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::LoopConfig;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SETTINGS_ENV_VAR: &str = "GRASSLANDS_SETTINGS";

type SettingsResult<T> = Result<T, String>;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

/// Overrides for `LoopConfig`. Every field is optional; unknown fields are
/// rejected so typos do not silently fall back to defaults.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    #[serde(default)]
    window_title: Option<String>,
    #[serde(default)]
    window_width: Option<u32>,
    #[serde(default)]
    window_height: Option<u32>,
    #[serde(default)]
    map_file: Option<String>,
    #[serde(default)]
    hero_image: Option<String>,
    #[serde(default)]
    move_speed: Option<f64>,
    #[serde(default)]
    zoom_step: Option<f64>,
    #[serde(default)]
    initial_zoom: Option<f64>,
    #[serde(default)]
    frame_stats_interval_ms: Option<u64>,
}

pub(crate) fn build_app() -> SettingsResult<AppWiring> {
    init_tracing();
    info!("=== Grasslands Startup ===");

    let mut config = LoopConfig::default();
    if let Some(path) = settings_path_from_env() {
        let settings = load_settings(&path)?;
        info!(path = %path.display(), "settings_loaded");
        config = settings.apply(config);
    }

    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn settings_path_from_env() -> Option<PathBuf> {
    env::var_os(SETTINGS_ENV_VAR)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn load_settings(path: &Path) -> SettingsResult<Settings> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read settings '{}': {error}", path.display()))?;
    let settings = parse_settings_json(&raw)?;
    settings.validate()?;
    Ok(settings)
}

fn parse_settings_json(raw: &str) -> SettingsResult<Settings> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, Settings>(&mut deserializer) {
        Ok(settings) => Ok(settings),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse settings json: {source}"))
            } else {
                Err(format!("parse settings json at {path}: {source}"))
            }
        }
    }
}

fn validation_err(path: &str, message: impl Display) -> String {
    format!("validation failed at {path}: {message}")
}

fn require_positive(path: &str, value: Option<f64>) -> SettingsResult<()> {
    match value {
        Some(value) if !value.is_finite() || value <= 0.0 => Err(validation_err(
            path,
            format!("expected a positive number, got {value}"),
        )),
        _ => Ok(()),
    }
}

fn require_non_zero(path: &str, value: Option<u64>) -> SettingsResult<()> {
    match value {
        Some(0) => Err(validation_err(path, "expected a non-zero value")),
        _ => Ok(()),
    }
}

impl Settings {
    fn validate(&self) -> SettingsResult<()> {
        require_non_zero("window_width", self.window_width.map(u64::from))?;
        require_non_zero("window_height", self.window_height.map(u64::from))?;
        require_non_zero("frame_stats_interval_ms", self.frame_stats_interval_ms)?;
        require_positive("zoom_step", self.zoom_step)?;
        require_positive("initial_zoom", self.initial_zoom)?;
        if let Some(speed) = self.move_speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(validation_err(
                    "move_speed",
                    format!("expected a non-negative number, got {speed}"),
                ));
            }
        }
        Ok(())
    }

    fn apply(self, config: LoopConfig) -> LoopConfig {
        LoopConfig {
            window_title: self.window_title.unwrap_or(config.window_title),
            window_width: self.window_width.unwrap_or(config.window_width),
            window_height: self.window_height.unwrap_or(config.window_height),
            map_file: self.map_file.unwrap_or(config.map_file),
            hero_image: self.hero_image.unwrap_or(config.hero_image),
            move_speed: self.move_speed.unwrap_or(config.move_speed),
            zoom_step: self.zoom_step.unwrap_or(config.zoom_step),
            initial_zoom: self.initial_zoom.unwrap_or(config.initial_zoom),
            frame_stats_interval: self
                .frame_stats_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(config.frame_stats_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_keeps_defaults() {
        let settings = parse_settings_json("{}").expect("parse");
        assert_eq!(settings, Settings::default());

        let config = settings.apply(LoopConfig::default());
        let defaults = LoopConfig::default();
        assert_eq!(config.window_width, defaults.window_width);
        assert_eq!(config.map_file, defaults.map_file);
        assert_eq!(config.move_speed, defaults.move_speed);
        assert_eq!(config.frame_stats_interval, defaults.frame_stats_interval);
    }

    #[test]
    fn present_fields_override_config() {
        let settings = parse_settings_json(
            r#"{"window_width": 1024, "map_file": "cave.tmx", "move_speed": 120.5, "frame_stats_interval_ms": 250}"#,
        )
        .expect("parse");

        let config = settings.apply(LoopConfig::default());
        assert_eq!(config.window_width, 1024);
        assert_eq!(config.window_height, 600);
        assert_eq!(config.map_file, "cave.tmx");
        assert_eq!(config.move_speed, 120.5);
        assert_eq!(config.frame_stats_interval, Duration::from_millis(250));
    }

    #[test]
    fn type_error_reports_field_path() {
        let error = parse_settings_json(r#"{"window_height": "tall"}"#).expect_err("type error");
        assert!(
            error.starts_with("parse settings json at window_height:"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let error = parse_settings_json(r#"{"zoom": 2.0}"#).expect_err("unknown field");
        assert!(error.contains("unknown field"), "unexpected error: {error}");
    }

    #[test]
    fn validation_rejects_non_positive_zoom_step() {
        let settings = parse_settings_json(r#"{"zoom_step": 0.0}"#).expect("parse");
        let error = settings.validate().expect_err("zero zoom step");
        assert_eq!(
            error,
            "validation failed at zoom_step: expected a positive number, got 0"
        );
    }

    #[test]
    fn validation_rejects_zero_window_size_and_negative_speed() {
        let zero_width = parse_settings_json(r#"{"window_width": 0}"#).expect("parse");
        assert!(zero_width
            .validate()
            .expect_err("zero width")
            .starts_with("validation failed at window_width"));

        let negative = parse_settings_json(r#"{"move_speed": -1.0}"#).expect("parse");
        assert!(negative
            .validate()
            .expect_err("negative speed")
            .starts_with("validation failed at move_speed"));
    }

    #[test]
    fn load_settings_reads_and_validates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"initial_zoom": 2.0, "hero_image": "knight.png"}"#)
            .expect("write settings");

        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.initial_zoom, Some(2.0));
        assert_eq!(settings.hero_image.as_deref(), Some("knight.png"));
    }

    #[test]
    fn load_settings_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_settings(&dir.path().join("absent.json")).expect_err("missing");
        assert!(error.starts_with("read settings"), "unexpected error: {error}");
    }
}
