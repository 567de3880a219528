use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid declaration: {0}")]
    Declaration(String),

    #[error("Unknown game: {0}")]
    UnknownGame(String),

    #[error("Unknown patch '{patch}' for game {game}")]
    UnknownPatch { game: String, patch: String },

    #[error("Invalid game config: {0}")]
    InvalidGameConfig(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Patch inheritance cycle: {0}")]
    InheritanceCycle(String),

    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("Invalid mod file {path:?}: {message}")]
    InvalidModFile { path: PathBuf, message: String },

    #[error("Failed to attach: {0}")]
    Attach(String),

    #[error("Failed to load script: {0}")]
    ScriptLoad(String),

    #[error("Script did not report ready within {0:?}")]
    ReadyTimeout(Duration),

    #[error("Instrumentation backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub(crate) fn declaration(message: impl Into<String>) -> Self {
        Error::Declaration(message.into())
    }
}
