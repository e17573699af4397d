use thiserror::Error;

/// Why a settings file could not become a usable [`crate::LongpollSettings`].
///
/// Bad env overrides are not errors; they come back as
/// [`crate::RejectedOverride`]s.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Parsed, but the server cannot run with it.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
