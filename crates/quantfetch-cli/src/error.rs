use quantfetch_core::{ConfigError, IngestError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Command(_) => 2,
            Self::Ingest(error) => match error {
                IngestError::InvalidRequest(_) | IngestError::Config(_) => 2,
                IngestError::SymbolNotFound { .. } | IngestError::Fetch { .. } => 3,
                IngestError::Validation { .. } => 5,
                IngestError::RateLimitExceeded { .. } => 6,
                IngestError::Cache(_) => 7,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }

    /// Machine-readable code for the error document.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::Config(_) => "config_error",
            Self::Ingest(error) => error.code(),
            Self::Command(_) => "command_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }
}
