use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },
    #[error("unterminated selector {0:?}")]
    Unterminated(String),
}
