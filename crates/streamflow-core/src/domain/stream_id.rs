//! Stream identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Prefix carried by every identifier this process generates.
const GENERATED_PREFIX: &str = "stream_";

/// Longest identifier accepted by [`StreamId::parse`].
pub const MAX_STREAM_ID_LEN: usize = 128;

/// Opaque, unique handle for a broadcast job.
///
/// Generated ids look like `stream_3f2a...` (UUID v4, simple form). Parsed
/// ids only need to be non-empty ASCII alphanumerics, `_` or `-`, which keeps
/// them safe to embed in external job names and URL paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

/// Reasons a string is not a valid [`StreamId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamIdError {
    #[error("stream id is empty")]
    Empty,

    #[error("stream id is {0} characters long (max {MAX_STREAM_ID_LEN})")]
    TooLong(usize),

    #[error("stream id contains invalid character {0:?}")]
    InvalidChar(char),
}

impl StreamId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{GENERATED_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Parse and validate an identifier supplied from outside.
    pub fn parse(raw: &str) -> Result<Self, StreamIdError> {
        if raw.is_empty() {
            return Err(StreamIdError::Empty);
        }
        if raw.len() > MAX_STREAM_ID_LEN {
            return Err(StreamIdError::TooLong(raw.len()));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(StreamIdError::InvalidChar(bad));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Whether this id has the shape [`StreamId::generate`] produces:
    /// `stream_` followed by 32 lowercase hex digits.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.0.strip_prefix(GENERATED_PREFIX).is_some_and(|hex| {
            hex.len() == 32
                && hex
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StreamId {
    type Err = StreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StreamId {
    type Error = StreamIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
