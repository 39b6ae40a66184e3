use quire_config::ConfigError;
use quire_engine::ComposeError;
use quire_source::SourceError;
use thiserror::Error;

/// Errors of a complete render job, from reading inputs to writing the PDF.
#[derive(Error, Debug)]
pub enum QuireError {
    #[error("Composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("Invalid data: {0}")]
    Source(#[from] SourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter '{0}': expected name=value")]
    InvalidParam(String),
}

impl From<ConfigError> for QuireError {
    fn from(e: ConfigError) -> Self {
        QuireError::Compose(ComposeError::Config(e))
    }
}
