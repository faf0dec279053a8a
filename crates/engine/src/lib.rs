use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
mod asset_names;
pub mod content;

pub use app::{
    run_app, world_to_screen_px, ActionStates, AppError, Camera, CameraError, CollisionWorld,
    Entity, EntityId, FrameEvent, FrameReport, FrameStatsSnapshot, InputAction, Key, LoopConfig,
    LoopState, Rect, RenderAssets, Renderer, SceneWorld, Simulation, SimulationSettings,
    SourceRect, SpriteId, StopReason, TileLayer, TileMap, TileRange, TilemapError, Tileset, Vec2,
    Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_STEP, DEFAULT_MOVE_SPEED,
};
pub use asset_names::AssetNameError;
pub use content::{
    load_image_rgba, load_tmx, parse_tmx, ImageLoadError, LoadedImage, MapData, SourceLocation,
    TmxError,
};

pub const ROOT_ENV_VAR: &str = "GRASSLANDS_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "GRASSLANDS_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and a data/ directory."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and data/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\grasslands\"\n\
Bash/zsh: export {env_var}=\"/path/to/grasslands\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
    #[error("invalid asset name '{name}': {source}")]
    InvalidAssetName {
        name: String,
        #[source]
        source: AssetNameError,
    },
    #[error("failed to load map {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: TmxError,
    },
    #[error("failed to load image {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: ImageLoadError,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let data_dir = root.join("data");
    Ok(AppPaths { root, data_dir })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            find_root_from(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_from(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("data").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
