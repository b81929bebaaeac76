use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Exact length of a content identifier.
pub const IDENTIFIER_LEN: usize = 11;

/// Shared error type for the FeedGuard crates.
#[derive(Debug, Error, Clone)]
pub enum GuardError {
    #[error("{message}")]
    Message { message: String },
}

impl GuardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Synthetic identity tag for a node in the host document.
///
/// The tag is assigned by the host adapter and never owns the node it names, so
/// holding one does not keep a detached element resident.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum IdentifierError {
    #[error("identifier must be {IDENTIFIER_LEN} characters, got {0}")]
    Length(usize),
    #[error("identifier contains invalid character {0:?}")]
    Charset(char),
}

/// Eleven-character token naming one content item.
///
/// Only ever derived from markup; construction validates the fixed format.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let len = raw.chars().count();
        if len != IDENTIFIER_LEN {
            return Err(IdentifierError::Length(len));
        }
        if let Some(bad) = raw.chars().find(|c| !is_identifier_char(*c)) {
            return Err(IdentifierError::Charset(bad));
        }
        Ok(Self(raw.to_string()))
    }

    /// `parse` for extraction strategies, where off-format values (padded
    /// ones included) are a miss rather than an error.
    pub fn recognize(raw: &str) -> Option<Self> {
        Self::parse(raw).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// Correlation id for one reconciliation pass.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PassId(pub String);

impl PassId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PassId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_identifier() {
        let id = Identifier::parse("dQw4w9WgXcQ").expect("valid");
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        assert!(Identifier::parse("ab_cd-EF123").is_ok());
    }

    #[test]
    fn rejects_wrong_length_and_charset() {
        assert_eq!(
            Identifier::parse("short"),
            Err(IdentifierError::Length(5))
        );
        assert_eq!(
            Identifier::parse("ABCDEFGHIJ?"),
            Err(IdentifierError::Charset('?'))
        );
        assert!(Identifier::recognize("ABCDEFGHIJK").is_some());
        assert!(Identifier::recognize(" ABCDEFGHIJK ").is_none());
        assert!(Identifier::recognize("ABCDEFGHIJKL").is_none());
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn serde_validates_on_the_way_in() {
        let id: Identifier = serde_json::from_str("\"ABCDEFGHIJK\"").expect("decode");
        assert_eq!(serde_json::to_string(&id).expect("encode"), "\"ABCDEFGHIJK\"");
        assert!(serde_json::from_str::<Identifier>("\"nope\"").is_err());
    }
}
