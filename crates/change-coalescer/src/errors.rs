use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum WaitError {
    #[error("{selector} did not appear within {timeout_ms}ms")]
    Timeout { selector: String, timeout_ms: u64 },
    #[error("mutation source closed while waiting for {0}")]
    SourceClosed(String),
}
