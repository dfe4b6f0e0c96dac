// ─── Version Catalog ───
// Manifest retrieval with a time-boxed disk cache, and per-version
// metadata resolution.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::manifest::{VersionDescriptor, VersionManifest};
use super::version_file::VersionMetadata;
use crate::core::downloader::source::RemoteSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::{sha1_bytes, ArtifactStore};

pub const DEFAULT_MANIFEST_TTL_SECS: i64 = 30 * 60;

/// On-disk envelope: `{"fetched_at": ..., "versions": [...]}`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedManifest {
    fetched_at: DateTime<Utc>,
    versions: Vec<VersionDescriptor>,
}

pub struct VersionCatalog {
    store: ArtifactStore,
    source: Arc<dyn RemoteSource>,
    manifest_url: String,
    ttl: Duration,
}

impl VersionCatalog {
    pub fn new(store: ArtifactStore, source: Arc<dyn RemoteSource>, manifest_url: &str) -> Self {
        Self {
            store,
            source,
            manifest_url: manifest_url.to_string(),
            ttl: Duration::seconds(DEFAULT_MANIFEST_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Ordered list of every published version.
    ///
    /// A cache younger than the freshness window is returned without any
    /// network access unless `force_refresh` is set. When the remote fetch
    /// fails, a stale cache is served instead; with no cache at all the
    /// error is [`LauncherError::ManifestUnavailable`].
    pub async fn fetch_manifest(&self, force_refresh: bool) -> LauncherResult<Vec<VersionDescriptor>> {
        let cached = self.read_cache().await;

        if !force_refresh {
            if let Some(cache) = &cached {
                if Utc::now() - cache.fetched_at < self.ttl {
                    debug!("Version manifest cache is fresh ({})", cache.fetched_at);
                    return Ok(cache.versions.clone());
                }
            }
        }

        match self.fetch_remote().await {
            Ok(manifest) => {
                if let Err(e) = self.write_cache(&manifest).await {
                    warn!("Could not persist version manifest cache: {}", e);
                }
                Ok(manifest.versions)
            }
            Err(err) => match cached {
                Some(cache) => {
                    warn!(
                        "Version manifest refresh failed ({}); using cache from {}",
                        err, cache.fetched_at
                    );
                    Ok(cache.versions)
                }
                None => Err(LauncherError::ManifestUnavailable(err.to_string())),
            },
        }
    }

    pub async fn find_version(&self, version_id: &str) -> LauncherResult<VersionDescriptor> {
        self.fetch_manifest(false)
            .await?
            .into_iter()
            .find(|v| v.id == version_id)
            .ok_or_else(|| LauncherError::VersionNotFound(version_id.to_string()))
    }

    /// Per-version metadata, from `versions/<id>/<id>.json` when present,
    /// otherwise fetched, checked against the manifest digest, and saved.
    pub async fn version_metadata(&self, version_id: &str) -> LauncherResult<VersionMetadata> {
        let path = self.store.version_json_path(version_id);
        if path.is_file() {
            match VersionMetadata::load(&path).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => warn!("Cached metadata for {} is unreadable ({}), refetching", version_id, e),
            }
        }

        let descriptor = self.find_version(version_id).await?;
        info!("Fetching metadata for {}", version_id);
        let raw = self.source.fetch_text(&descriptor.url).await?;

        if let Some(expected) = &descriptor.sha1 {
            let actual = sha1_bytes(raw.as_bytes());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Integrity {
                    path,
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let metadata = VersionMetadata::from_json(&raw)?;
        write_file(&path, raw.as_bytes()).await?;
        Ok(metadata)
    }

    /// Metadata already on disk, without touching the network.
    pub async fn installed_metadata(&self, version_id: &str) -> Option<VersionMetadata> {
        VersionMetadata::load(&self.store.version_json_path(version_id))
            .await
            .ok()
    }

    async fn fetch_remote(&self) -> LauncherResult<VersionManifest> {
        info!("Fetching version manifest...");
        let raw = self.source.fetch_text(&self.manifest_url).await?;
        let manifest: VersionManifest = serde_json::from_str(&raw)?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    async fn read_cache(&self) -> Option<CachedManifest> {
        let path = self.store.manifest_cache_path();
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("Ignoring corrupt manifest cache {:?}: {}", path, e);
                None
            }
        }
    }

    async fn write_cache(&self, manifest: &VersionManifest) -> LauncherResult<()> {
        let cache = CachedManifest {
            fetched_at: Utc::now(),
            versions: manifest.versions.clone(),
        };
        let payload = serde_json::to_vec(&cache)?;
        write_file(&self.store.manifest_cache_path(), &payload).await
    }
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{temp_root, MemorySource};

    const MANIFEST_URL: &str = "https://example.invalid/version_manifest_v2.json";
    const META_URL: &str = "https://example.invalid/v1/packages/1.20.1.json";

    fn manifest_json(meta_sha1: &str) -> String {
        serde_json::json!({
            "latest": {"release": "1.20.1", "snapshot": "1.20.1"},
            "versions": [{
                "id": "1.20.1",
                "type": "release",
                "url": META_URL,
                "releaseTime": "2023-06-12T13:25:51+00:00",
                "sha1": meta_sha1,
                "complianceLevel": 1
            }]
        })
        .to_string()
    }

    fn metadata_json() -> String {
        serde_json::json!({
            "id": "1.20.1",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {"game": [], "jvm": []}
        })
        .to_string()
    }

    fn seed_cache(store: &ArtifactStore, fetched_at: DateTime<Utc>) {
        let manifest: VersionManifest = serde_json::from_str(&manifest_json("00")).unwrap();
        let cache = CachedManifest {
            fetched_at,
            versions: manifest.versions,
        };
        let path = store.manifest_cache_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec(&cache).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn fresh_cache_makes_no_remote_calls() {
        let root = temp_root("catalog-fresh");
        let store = ArtifactStore::new(&root);
        seed_cache(&store, Utc::now() - Duration::minutes(5));

        let source = Arc::new(MemorySource::new());
        let catalog = VersionCatalog::new(store, source.clone(), MANIFEST_URL);
        let versions = catalog.fetch_manifest(false).await.unwrap();

        assert_eq!(versions.len(), 1);
        assert_eq!(source.total_calls(), 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn stale_cache_is_refreshed_and_rewritten() {
        let root = temp_root("catalog-stale");
        let store = ArtifactStore::new(&root);
        seed_cache(&store, Utc::now() - Duration::hours(2));

        let source = Arc::new(MemorySource::new().with_text(MANIFEST_URL, manifest_json("ab")));
        let catalog = VersionCatalog::new(store.clone(), source.clone(), MANIFEST_URL);
        let versions = catalog.fetch_manifest(false).await.unwrap();

        assert_eq!(source.calls(MANIFEST_URL), 1);
        assert_eq!(versions[0].sha1.as_deref(), Some("ab"));

        let envelope: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.manifest_cache_path()).unwrap()).unwrap();
        assert!(envelope["fetched_at"].is_string());
        assert_eq!(envelope["versions"][0]["id"], "1.20.1");
        assert_eq!(envelope["versions"][0]["sha1"], "ab");

        // Second read hits the rewritten cache.
        catalog.fetch_manifest(false).await.unwrap();
        assert_eq!(source.calls(MANIFEST_URL), 1);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_stale_cache() {
        let root = temp_root("catalog-fallback");
        let store = ArtifactStore::new(&root);
        seed_cache(&store, Utc::now() - Duration::days(3));

        let source = Arc::new(MemorySource::new());
        source.set_offline(true);
        let catalog = VersionCatalog::new(store, source.clone(), MANIFEST_URL);

        let versions = catalog.fetch_manifest(true).await.unwrap();
        assert_eq!(versions[0].id, "1.20.1");
        assert_eq!(source.calls(MANIFEST_URL), 1);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn no_cache_and_no_network_is_an_error() {
        let root = temp_root("catalog-empty");
        let source = Arc::new(MemorySource::new());
        source.set_offline(true);
        let catalog = VersionCatalog::new(ArtifactStore::new(&root), source, MANIFEST_URL);

        let err = catalog.fetch_manifest(false).await.unwrap_err();
        assert!(matches!(err, LauncherError::ManifestUnavailable(_)));
    }

    #[tokio::test]
    async fn metadata_is_verified_and_cached_on_disk() {
        let root = temp_root("catalog-metadata");
        let store = ArtifactStore::new(&root);
        let meta = metadata_json();
        let source = Arc::new(
            MemorySource::new()
                .with_text(MANIFEST_URL, manifest_json(&sha1_bytes(meta.as_bytes())))
                .with_text(META_URL, meta),
        );
        let catalog = VersionCatalog::new(store.clone(), source.clone(), MANIFEST_URL);

        let metadata = catalog.version_metadata("1.20.1").await.unwrap();
        assert_eq!(metadata.main_class, "net.minecraft.client.main.Main");
        assert!(store.version_json_path("1.20.1").is_file());

        catalog.version_metadata("1.20.1").await.unwrap();
        assert_eq!(source.calls(META_URL), 1);

        assert!(matches!(
            catalog.version_metadata("9.9.9").await.unwrap_err(),
            LauncherError::VersionNotFound(_)
        ));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn tampered_metadata_is_rejected() {
        let root = temp_root("catalog-tampered");
        let source = Arc::new(
            MemorySource::new()
                .with_text(MANIFEST_URL, manifest_json("0000000000000000000000000000000000000000"))
                .with_text(META_URL, metadata_json()),
        );
        let catalog = VersionCatalog::new(ArtifactStore::new(&root), source, MANIFEST_URL);

        let err = catalog.version_metadata("1.20.1").await.unwrap_err();
        assert!(matches!(err, LauncherError::Integrity { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }
}
