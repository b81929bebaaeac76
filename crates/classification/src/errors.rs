use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassificationError {
    /// The other end of the message channel went away (worker restarted,
    /// host context torn down). Expected during normal operation.
    #[error("classification channel closed")]
    ChannelClosed,
    #[error("remote classifier failed: {0}")]
    Remote(String),
    #[error("classification timed out after {0}ms")]
    Timeout(u64),
    #[error("invalid classification response: {0}")]
    InvalidResponse(String),
}

impl ClassificationError {
    pub fn is_expected_closure(&self) -> bool {
        matches!(self, ClassificationError::ChannelClosed)
    }
}
