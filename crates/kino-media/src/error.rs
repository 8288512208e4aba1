//! Error types for Kino Media

use thiserror::Error;

/// Result type alias for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Media error types
#[derive(Error, Debug)]
pub enum Error {
    // Provider errors
    #[error("Failed to load provider {loader}: {reason}")]
    ProviderLoad { loader: String, reason: String },

    #[error("Provider {provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("No provider attached")]
    NoProvider,

    // Source errors
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Failed to probe source type: {src}")]
    Probe { src: String, source: reqwest::Error },

    // Adaptive engine errors
    #[error("Adaptive engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Adaptive engine {kind} error: {details}")]
    Engine {
        kind: String,
        details: String,
        fatal: bool,
    },

    // Remote playback errors
    #[error("Cast command failed: {0}")]
    Cast(String),

    // Media element errors
    #[error("Media element error: {0}")]
    Media(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a provider load error
    pub fn load(loader: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ProviderLoad {
            loader: loader.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Probe { .. } | Error::Network(_) | Error::Cast(_) => true,
            Error::Engine { fatal, .. } => !fatal,
            _ => false,
        }
    }

    /// Returns the error code carried by player error notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::ProviderLoad { .. } => "PROVIDER_LOAD",
            Error::Unsupported { .. } => "UNSUPPORTED",
            Error::NoProvider => "NO_PROVIDER",
            Error::InvalidSource(_) => "INVALID_SOURCE",
            Error::Probe { .. } => "SOURCE_PROBE",
            Error::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            Error::Engine { .. } => "ENGINE",
            Error::Cast(_) => "CAST",
            Error::Media(_) => "MEDIA",
            Error::Network(_) => "NETWORK",
            Error::Url(_) => "INVALID_URL",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }
}
