//! Ingest destinations and the platforms that define their URLs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder printed instead of an ingest key.
const REDACTED: &str = "****";

/// Live-streaming platform. Determines the ingest URL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Facebook,
}

impl Platform {
    /// Ingest URL prefix; the stream key is appended verbatim.
    #[must_use]
    pub const fn ingest_base(self) -> &'static str {
        match self {
            Self::YouTube => "rtmp://a.rtmp.youtube.com/live2/",
            Self::Facebook => "rtmps://live-api-s.facebook.com:443/rtmp/",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Self::YouTube),
            "facebook" => Ok(Self::Facebook),
            other => Err(format!(
                "unknown platform '{other}' (expected 'youtube' or 'facebook')"
            )),
        }
    }
}

/// Problems with a single destination credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("{platform} stream key is empty")]
    EmptyKey { platform: Platform },

    #[error("{platform} stream key contains invalid character {found:?}")]
    InvalidKeyChar { platform: Platform, found: char },
}

/// A (platform, ingest key) pair.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub platform: Platform,
    pub key: String,
}

impl Destination {
    pub fn new(platform: Platform, key: impl Into<String>) -> Self {
        Self {
            platform,
            key: key.into(),
        }
    }

    pub fn youtube(key: impl Into<String>) -> Self {
        Self::new(Platform::YouTube, key)
    }

    pub fn facebook(key: impl Into<String>) -> Self {
        Self::new(Platform::Facebook, key)
    }

    /// Check that the key can be appended to the ingest URL as-is.
    ///
    /// Keys are never escaped, so anything that could change the meaning of
    /// the URL (path separators, whitespace, control characters) is refused.
    pub fn validate(&self) -> Result<(), DestinationError> {
        if self.key.trim().is_empty() {
            return Err(DestinationError::EmptyKey {
                platform: self.platform,
            });
        }
        if let Some(found) = self
            .key
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || *c == '/')
        {
            return Err(DestinationError::InvalidKeyChar {
                platform: self.platform,
                found,
            });
        }
        Ok(())
    }

    /// Full ingest URL including the key.
    #[must_use]
    pub fn ingest_url(&self) -> String {
        format!("{}{}", self.platform.ingest_base(), self.key)
    }

    /// Ingest URL with the key masked, for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        format!("{}{REDACTED}", self.platform.ingest_base())
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("platform", &self.platform)
            .field("key", &REDACTED)
            .finish()
    }
}
