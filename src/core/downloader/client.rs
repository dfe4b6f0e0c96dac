use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::source::RemoteSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::{file_len, sha1_file};

/// A single file to download with optional SHA-1 and size for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

impl DownloadEntry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha1: None,
            size: None,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1;
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file on disk already matched; nothing was fetched.
    AlreadyValid,
    Downloaded {
        /// Offset the transfer resumed from (0 for a full fetch).
        resumed_from: u64,
        /// 1, or 2 when the first copy failed its hash check.
        attempts: u32,
        /// Bytes actually received over the wire.
        transferred: u64,
    },
}

/// Resumable, SHA-1 validated single-file downloader.
#[derive(Clone)]
pub struct Downloader {
    source: Arc<dyn RemoteSource>,
}

impl Downloader {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn RemoteSource> {
        &self.source
    }

    /// Make sure `entry.dest` holds the expected bytes.
    ///
    /// - A file that already validates is left alone.
    /// - A partial file shorter than the declared size is resumed.
    /// - A hash mismatch after transfer deletes the file and re-downloads it
    ///   once from zero; a second mismatch is an integrity error.
    pub async fn ensure_file(&self, entry: &DownloadEntry) -> LauncherResult<FileOutcome> {
        if is_valid(entry).await {
            debug!("Already valid: {:?}", entry.dest);
            return Ok(FileOutcome::AlreadyValid);
        }

        if let Some(parent) = entry.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let (resumed_from, first_bytes) = self.transfer(entry, true).await?;
        let Some(mismatch) = verify(entry).await? else {
            return Ok(FileOutcome::Downloaded {
                resumed_from,
                attempts: 1,
                transferred: first_bytes,
            });
        };

        warn!(
            "Hash mismatch for {:?} (got {}), retrying from scratch",
            entry.dest, mismatch
        );
        remove_quietly(&entry.dest).await;

        let (_, retry_bytes) = self.transfer(entry, false).await?;
        match verify(entry).await? {
            None => Ok(FileOutcome::Downloaded {
                resumed_from: 0,
                attempts: 2,
                transferred: first_bytes + retry_bytes,
            }),
            Some(actual) => {
                remove_quietly(&entry.dest).await;
                Err(LauncherError::Integrity {
                    path: entry.dest.clone(),
                    expected: entry.sha1.clone().unwrap_or_default(),
                    actual,
                })
            }
        }
    }

    /// Stream the body to disk. Returns (offset resumed from, bytes written).
    async fn transfer(&self, entry: &DownloadEntry, allow_resume: bool) -> LauncherResult<(u64, u64)> {
        let offset = if allow_resume {
            resume_offset(&entry.dest, entry.size).await
        } else {
            0
        };

        let mut body = self.source.fetch_from(&entry.url, offset).await?;
        let resumed_from = if body.resumed { offset } else { 0 };

        let opened = if resumed_from > 0 {
            debug!("Resuming {} at byte {}", entry.url, resumed_from);
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&entry.dest)
                .await
        } else {
            tokio::fs::File::create(&entry.dest).await
        };
        let mut file = opened.map_err(|e| LauncherError::Io {
            path: entry.dest.clone(),
            source: e,
        })?;

        let mut written = 0u64;
        while let Some(chunk) = body.chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::Io {
                    path: entry.dest.clone(),
                    source: e,
                })?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| LauncherError::Io {
            path: entry.dest.clone(),
            source: e,
        })?;
        drop(file);

        debug!("Downloaded: {} -> {:?}", entry.url, entry.dest);
        Ok((resumed_from, written))
    }
}

/// Offset to resume from: the length of a partial file that is strictly
/// shorter than the declared size. Anything else starts over.
async fn resume_offset(dest: &Path, declared: Option<u64>) -> u64 {
    match (file_len(dest).await, declared) {
        (Some(len), Some(total)) if len > 0 && len < total => len,
        _ => 0,
    }
}

async fn is_valid(entry: &DownloadEntry) -> bool {
    let Some(len) = file_len(&entry.dest).await else {
        return false;
    };
    if let Some(size) = entry.size {
        if size != len {
            return false;
        }
    }
    match &entry.sha1 {
        Some(expected) => matches!(
            sha1_file(&entry.dest).await,
            Ok(actual) if actual.eq_ignore_ascii_case(expected)
        ),
        None => true,
    }
}

/// `Ok(None)` when the file matches, `Ok(Some(actual))` on mismatch.
async fn verify(entry: &DownloadEntry) -> LauncherResult<Option<String>> {
    let Some(expected) = &entry.sha1 else {
        return Ok(None);
    };
    let actual = sha1_file(&entry.dest).await?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(None)
    } else {
        Ok(Some(actual))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}
