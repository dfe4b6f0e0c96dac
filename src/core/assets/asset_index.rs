use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::ArtifactStore;
use crate::core::version::AssetIndexInfo;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index document.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    /// Fetch (or reuse) `assets/indexes/<id>.json` and parse it.
    pub async fn ensure(
        info: &AssetIndexInfo,
        store: &ArtifactStore,
        downloader: &Downloader,
    ) -> LauncherResult<Self> {
        let path = store.asset_index_path(&info.id);
        let entry = DownloadEntry::new(&info.url, &path)
            .with_sha1(info.sha1.clone())
            .with_size(info.size);
        downloader.ensure_file(&entry).await?;

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LauncherError::Io {
                path: path.clone(),
                source: e,
            })?;
        let index: AssetIndex = serde_json::from_str(&raw)?;
        debug!("Asset index {} lists {} objects", info.id, index.objects.len());
        Ok(index)
    }

    /// One download entry per distinct object hash.
    pub fn object_entries(&self, store: &ArtifactStore) -> Vec<DownloadEntry> {
        let mut seen = HashSet::new();
        self.objects
            .values()
            .filter(|obj| obj.hash.len() > 2 && seen.insert(obj.hash.clone()))
            .map(|obj| {
                DownloadEntry::new(object_url(&obj.hash), store.asset_object_path(&obj.hash))
                    .with_sha1(Some(obj.hash.clone()))
                    .with_size(Some(obj.size))
            })
            .collect()
    }
}

pub fn object_url(hash: &str) -> String {
    let prefix = hash.get(..2).unwrap_or(hash);
    format!("{RESOURCES_URL}/{prefix}/{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_hashes_download_once() {
        let index: AssetIndex = serde_json::from_str(
            r#"{"objects": {
                "minecraft/sounds/a.ogg": {"hash": "aabbccddeeff00112233445566778899aabbccdd", "size": 10},
                "minecraft/sounds/b.ogg": {"hash": "aabbccddeeff00112233445566778899aabbccdd", "size": 10},
                "icons/icon_16x16.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665}
            }}"#,
        )
        .unwrap();

        let store = ArtifactStore::new("/data");
        let entries = index.object_entries(&store);
        assert_eq!(entries.len(), 2);
        let icon = entries
            .iter()
            .find(|e| e.sha1.as_deref() == Some("bdf48ef6b5d0d23bbb02e17d04865216179f510a"))
            .unwrap();
        assert_eq!(
            icon.url,
            "https://resources.download.minecraft.net/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
        assert_eq!(icon.size, Some(3665));
    }
}
