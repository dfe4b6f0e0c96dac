use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`LauncherError`], used by callers that want to
/// decide between retrying, asking the user, or giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Integrity,
    FileSystem,
    Validation,
    ProcessSpawn,
    Cancelled,
    Data,
    Loader,
}

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Native archives are missing: {}", display_paths(.paths))]
    MissingNatives { paths: Vec<PathBuf> },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Catalog ─────────────────────────────────────────
    #[error("Version {0} not found in the version manifest")]
    VersionNotFound(String),

    #[error("Version manifest unavailable and no cached copy exists: {0}")]
    ManifestUnavailable(String),

    #[error("Download of {0} was cancelled")]
    Cancelled(String),

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── XML ─────────────────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Launch ──────────────────────────────────────────
    #[error("Invalid launch configuration: {}", .violations.join("; "))]
    Validation { violations: Vec<String> },

    #[error("No credentials available for launch")]
    CredentialsMissing,

    #[error("Credentials expired at {expired_at}")]
    CredentialsExpired { expired_at: DateTime<Utc> },

    #[error("Profile {0} already has a running game process")]
    AlreadyRunning(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Failed to spawn {program:?}: {source}")]
    ProcessSpawn {
        program: PathBuf,
        source: std::io::Error,
    },

    // ── Java ────────────────────────────────────────────
    #[error("Java not found for major version {0}")]
    JavaNotFound(u32),

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    pub fn validation(violations: Vec<String>) -> Self {
        LauncherError::Validation { violations }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Io { .. } | LauncherError::MissingNatives { .. } => {
                ErrorKind::FileSystem
            }
            LauncherError::Http(_)
            | LauncherError::DownloadFailed { .. }
            | LauncherError::Network(_)
            | LauncherError::ManifestUnavailable(_)
            | LauncherError::LoaderApi(_) => ErrorKind::Network,
            LauncherError::Integrity { .. } | LauncherError::Zip(_) => ErrorKind::Integrity,
            LauncherError::Cancelled(_) => ErrorKind::Cancelled,
            LauncherError::Validation { .. }
            | LauncherError::CredentialsMissing
            | LauncherError::CredentialsExpired { .. }
            | LauncherError::AlreadyRunning(_)
            | LauncherError::ProfileNotFound(_)
            | LauncherError::JavaNotFound(_) => ErrorKind::Validation,
            LauncherError::ProcessSpawn { .. } | LauncherError::JavaExecution(_) => {
                ErrorKind::ProcessSpawn
            }
            LauncherError::Loader(_) => ErrorKind::Loader,
            LauncherError::VersionNotFound(_)
            | LauncherError::InvalidMavenCoordinate(_)
            | LauncherError::Xml(_)
            | LauncherError::Json(_)
            | LauncherError::Other(_) => ErrorKind::Data,
        }
    }

    /// Whether running the same operation again may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            LauncherError::DownloadFailed { status, .. } => *status == 429 || *status >= 500,
            LauncherError::Http(err) => !err.is_builder() && !err.is_decode(),
            _ => self.kind() == ErrorKind::Network,
        }
    }

    /// Human-readable next steps for the failure.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            LauncherError::Io { path, .. } => vec![
                format!(
                    "Check that {} exists and the launcher can write to it",
                    path.display()
                ),
                "Free some disk space and try again".to_string(),
            ],
            LauncherError::MissingNatives { paths } => vec![
                "Download the version again to restore its native libraries".to_string(),
                format!("{} archive(s) were not found in the libraries folder", paths.len()),
            ],
            LauncherError::Http(_)
            | LauncherError::DownloadFailed { .. }
            | LauncherError::Network(_)
            | LauncherError::LoaderApi(_) => vec![
                "Check your internet connection".to_string(),
                "Retry the operation; partial downloads resume where they stopped".to_string(),
            ],
            LauncherError::ManifestUnavailable(_) => vec![
                "Connect to the internet once so the version list can be cached".to_string(),
            ],
            LauncherError::Integrity { path, .. } => vec![
                format!("Delete {} and download it again", path.display()),
                "If the mismatch persists the mirror may be serving a corrupted file".to_string(),
            ],
            LauncherError::Cancelled(_) => {
                vec!["Start the download again to resume it".to_string()]
            }
            LauncherError::Validation { violations } => violations
                .iter()
                .map(|v| format!("Fix: {v}"))
                .chain(std::iter::once(
                    "Review the profile settings and reinstall the version if files are missing"
                        .to_string(),
                ))
                .collect(),
            LauncherError::CredentialsMissing | LauncherError::CredentialsExpired { .. } => {
                vec!["Sign in again to refresh your account session".to_string()]
            }
            LauncherError::AlreadyRunning(_) => vec![
                "Close the running game, or kill it from the launcher, before starting it again"
                    .to_string(),
            ],
            LauncherError::ProfileNotFound(_) => {
                vec!["Select an existing profile or create a new one".to_string()]
            }
            LauncherError::ProcessSpawn { program, .. } => vec![
                format!("Verify that {} is a working Java executable", program.display()),
                "Select a different Java runtime in the profile settings".to_string(),
            ],
            LauncherError::JavaNotFound(major) => vec![
                format!("Install Java {major} or point the profile at a Java {major} executable"),
            ],
            LauncherError::JavaExecution(_) => {
                vec!["Check that the selected Java runtime starts correctly".to_string()]
            }
            LauncherError::Zip(_) => vec![
                "Clear the natives directory and launch again".to_string(),
                "Validate the installation to replace corrupted libraries".to_string(),
            ],
            LauncherError::Loader(_) => vec![
                "Reinstall the mod loader for this version".to_string(),
                "Try a different loader version".to_string(),
            ],
            LauncherError::VersionNotFound(_) => {
                vec!["Refresh the version list and pick an available version".to_string()]
            }
            LauncherError::InvalidMavenCoordinate(_)
            | LauncherError::Xml(_)
            | LauncherError::Json(_)
            | LauncherError::Other(_) => {
                vec!["Validate the installation or reinstall the version".to_string()]
            }
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for event consumers ─────────────────
impl Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
