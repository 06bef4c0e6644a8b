use std::io;

use gradebook_core::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("logger initialization failed: {0}")]
    Logger(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("task join error: {0}")]
    Join(String),
    #[error("http server error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
