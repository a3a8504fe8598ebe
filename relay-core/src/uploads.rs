//! Message files uploaded by users, stored flat on local disk by name.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::RelayError;

static UNSAFE_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").ok());

/// Reduce a client-supplied file name to a safe flat name.
///
/// Path components are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading dots are stripped. Returns `None`
/// when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.as_ref()?.replace_all(&joined, "");
    let trimmed = cleaned.trim_start_matches(['.', '_']).trim_end_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Non-blank lines of a message file, trimmed, in file order.
/// Invalid UTF-8 sequences are dropped.
pub fn message_lines(bytes: &[u8]) -> Vec<String> {
    let text: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), RelayError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// On-disk location for `name`, or `None` if the name sanitizes to nothing.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        sanitize_filename(name).map(|n| self.dir.join(n))
    }

    /// Store `bytes` under the sanitized form of `name`, replacing any
    /// previous file of that name. Returns the stored name.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<String, RelayError> {
        let stored = sanitize_filename(name)
            .ok_or_else(|| RelayError::Other(format!("unusable file name: {name:?}")))?;
        self.ensure_dir().await?;
        tokio::fs::write(self.dir.join(&stored), bytes).await?;
        tracing::info!(file = %stored, bytes = bytes.len(), "Stored message file");
        Ok(stored)
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.path_for(name) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, RelayError> {
        let path = self.path_for(name).ok_or_else(|| {
            RelayError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such upload: {name}"),
            ))
        })?;
        Ok(tokio::fs::read(path).await?)
    }

    pub async fn read_lines(&self, name: &str) -> Result<Vec<String>, RelayError> {
        Ok(message_lines(&self.read(name).await?))
    }
}
