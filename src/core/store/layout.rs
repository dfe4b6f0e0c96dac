// ─── Artifact Store ───
// Owns the on-disk layout every other component reads from and writes to.
//
//   <root>/
//     versions/version_manifest_v2.cache.json
//     versions/<id>/<id>.json
//     versions/<id>/<id>.jar
//     versions/<id>/natives/
//     libraries/<maven path>
//     assets/indexes/<index id>.json
//     assets/objects/<hh>/<hash>

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::core::error::{LauncherError, LauncherResult};

const MANIFEST_CACHE_FILE: &str = "version_manifest_v2.cache.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    pub fn version_json_path(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.json"))
    }

    pub fn version_jar_path(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.jar"))
    }

    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join("natives")
    }

    pub fn manifest_cache_path(&self) -> PathBuf {
        self.versions_dir().join(MANIFEST_CACHE_FILE)
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// Resolve a `/`-separated library path (as found in version documents).
    pub fn library_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.libraries_dir(), |acc, segment| acc.join(segment))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{index_id}.json"))
    }

    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    pub fn installers_dir(&self) -> PathBuf {
        self.root.join("installers")
    }
}

// ─── Hashing ───

/// Stream a file through SHA-1 and return the lowercase hex digest.
pub async fn sha1_file(path: &Path) -> LauncherResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await.map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn sha1_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// `true` when the file exists and its digest equals `expected` (case-insensitive).
pub async fn sha1_matches(path: &Path, expected: &str) -> bool {
    match sha1_file(path).await {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(_) => false,
    }
}

pub async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}
