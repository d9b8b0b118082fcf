//! Error types for AvPlayer Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Asset not found: {path}")]
    AssetNotFound { path: String },

    // Engine errors
    #[error("Engine setup failed: {0}")]
    EngineSetup(String),

    #[error("{0}")]
    EngineFatal(String),

    // Surface errors
    #[error("Surface registration failed: {0}")]
    SurfaceRegistration(String),

    // Registry errors
    #[error("Unknown player: {id}")]
    UnknownPlayer { id: i64 },

    #[error("Player task has stopped")]
    PlayerGone,

    // Channel errors
    #[error("Invalid argument for {method}: {reason}")]
    InvalidArgument { method: String, reason: String },

    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid-argument error for a channel method
    pub fn invalid_argument(method: &str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error ends the current session
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EngineFatal(_))
    }

    /// Returns the error code used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidSource(_) => "INVALID_SOURCE",
            Error::AssetNotFound { .. } => "ASSET_NOT_FOUND",
            Error::EngineSetup(_) => "ENGINE_SETUP",
            Error::EngineFatal(_) => "ENGINE_FATAL",
            Error::SurfaceRegistration(_) => "SURFACE_REGISTRATION",
            Error::UnknownPlayer { .. } => "UNKNOWN_PLAYER",
            Error::PlayerGone => "PLAYER_GONE",
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::NotImplemented(_) => "NOT_IMPLEMENTED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
