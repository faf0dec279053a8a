use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetNameError {
    #[error("asset name must not be empty")]
    Empty,
    #[error("asset name must be relative to the data directory")]
    Absolute,
    #[error("asset name must not contain '\\\\'")]
    Backslash,
    #[error("asset name must not contain '..'")]
    ParentTraversal,
    #[error("asset name contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Configured file names (map, hero sprite) are resolved under the data
/// directory and may not escape it.
pub(crate) fn validate_asset_name(name: &str) -> Result<(), AssetNameError> {
    if name.is_empty() {
        return Err(AssetNameError::Empty);
    }
    if name.starts_with('/') || name.chars().nth(1) == Some(':') {
        return Err(AssetNameError::Absolute);
    }
    if name.contains('\\') {
        return Err(AssetNameError::Backslash);
    }
    if name.split('/').any(|segment| segment == "..") {
        return Err(AssetNameError::ParentTraversal);
    }
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '-' | '.') {
            continue;
        }
        return Err(AssetNameError::InvalidCharacter { character: ch });
    }
    Ok(())
}
