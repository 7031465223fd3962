//! On-disk storage for uploaded source videos.
//!
//! Files are stored flat under one directory as `<unix-millis>-<name>`, where
//! `name` is the client's file name with whitespace turned into `_` and
//! anything that could escape the directory dropped.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Used when nothing survives sanitizing.
const FALLBACK_NAME: &str = "upload";

/// Attempts at a fresh name when two uploads collide on the same millisecond.
const MAX_NAME_ATTEMPTS: i64 = 16;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded.")]
    Missing,

    /// The request body broke off or was malformed.
    #[error("Upload interrupted: {0}")]
    Body(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Directory that receives uploads.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Create `dir` if needed and resolve it to an absolute path, so stored
    /// paths can be handed straight to ffmpeg.
    pub async fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        let dir = fs::canonicalize(dir).await?;
        info!(dir = %dir.display(), "Uploads directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `body` to a new file named after `original_name` and return its
    /// absolute path. A partial file is removed if the body fails.
    pub async fn store<S, E>(&self, original_name: &str, body: S) -> Result<PathBuf, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let (path, mut file) = self.create(original_name).await?;

        let mut body = std::pin::pin!(body);
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let result = match chunk {
                Ok(bytes) => {
                    written += bytes.len() as u64;
                    file.write_all(&bytes).await.map_err(UploadError::from)
                }
                Err(e) => Err(UploadError::Body(e.to_string())),
            };
            if let Err(err) = result {
                warn!(path = %path.display(), error = %err, "Upload failed, removing partial file");
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(err);
            }
        }
        file.flush().await?;

        info!(path = %path.display(), bytes = written, "Upload stored");
        Ok(path)
    }

    async fn create(&self, original_name: &str) -> io::Result<(PathBuf, File)> {
        let name = sanitize_file_name(original_name);
        let millis = Utc::now().timestamp_millis();
        let mut attempt = 0;
        loop {
            let path = self.dir.join(stored_name(millis + attempt, &name));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    debug!(path = %path.display(), "Upload name taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `<millis>-<name>`.
pub fn stored_name(millis: i64, sanitized: &str) -> String {
    format!("{millis}-{sanitized}")
}

/// Whitespace becomes `_`; only alphanumerics, `.`, `-` and `_` survive.
/// Leading dots are trimmed so the result is never a hidden or parent entry.
pub fn sanitize_file_name(original: &str) -> String {
    let cleaned: String = original
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
