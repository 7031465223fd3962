//! Mapping between stream ids and external process-manager job names.

use thiserror::Error;

use super::StreamId;

/// Default prefix for external job names.
pub const DEFAULT_JOB_PREFIX: &str = "streamflow-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("job name prefix must not be empty")]
    EmptyPrefix,

    #[error("job name prefix contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Bijective mapping `StreamId <-> external job name` within one prefix.
///
/// Names that do not carry the prefix, or whose remainder is not a valid
/// stream id, belong to someone else and are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNaming {
    prefix: String,
}

impl JobNaming {
    pub fn new(prefix: impl Into<String>) -> Result<Self, NamingError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(NamingError::EmptyPrefix);
        }
        if let Some(bad) = prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(NamingError::InvalidChar(bad));
        }
        Ok(Self { prefix })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn external_name(&self, id: &StreamId) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Recover the stream id from an external name we produced.
    ///
    /// Only generated ids are recognised; a hand-made job that happens to
    /// share the prefix is not ours.
    #[must_use]
    pub fn parse(&self, name: &str) -> Option<StreamId> {
        name.strip_prefix(&self.prefix)
            .and_then(|rest| StreamId::parse(rest).ok())
            .filter(StreamId::is_generated)
    }
}

impl Default for JobNaming {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_JOB_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_prefix() {
        let naming = JobNaming::default();
        let id = StreamId::generate();
        let name = naming.external_name(&id);
        assert!(name.starts_with(DEFAULT_JOB_PREFIX));
        assert_eq!(naming.parse(&name), Some(id));
    }

    #[test]
    fn foreign_names_are_ignored() {
        let naming = JobNaming::new("sf-").unwrap();
        assert_eq!(naming.parse("other-app"), None);
        assert_eq!(naming.parse("sf-"), None);
        assert_eq!(naming.parse("sf-not valid"), None);
        assert_eq!(naming.parse("sf-stream_backup"), None);
        assert_eq!(naming.parse("sf-stream_1718000000000"), None);
    }

    #[test]
    fn prefix_is_validated() {
        assert_eq!(JobNaming::new(""), Err(NamingError::EmptyPrefix));
        assert_eq!(JobNaming::new("a b"), Err(NamingError::InvalidChar(' ')));
        assert!(JobNaming::new("team.streams-").is_ok());
    }
}
