use thiserror::Error;

use feedguard_document::SelectorError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unsupported config path: {0}")]
    UnsupportedPath(String),
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("markup table: {0}")]
    Markup(#[from] SelectorError),
    #[error("service already started")]
    AlreadyStarted,
    #[error("service has been shut down")]
    ShutDown,
}
