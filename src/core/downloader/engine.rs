// ─── Download Engine ───
// Materializes everything a version needs: client jar, libraries, native
// archives, asset index and asset objects.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{DownloadEntry, Downloader, FileOutcome};
use super::progress::{
    format_bytes, DownloadProgress, DownloadStatus, ProgressSender, ProgressTracker,
};
use crate::core::assets::AssetIndex;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::{sha1_matches, ArtifactStore};
use crate::core::version::{RuleContext, VersionCatalog, VersionMetadata};

pub struct DownloadEngine {
    store: ArtifactStore,
    catalog: Arc<VersionCatalog>,
    downloader: Downloader,
    rules: RuleContext,
    active: Mutex<HashMap<String, CancellationToken>>,
    version_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DownloadEngine {
    pub fn new(
        store: ArtifactStore,
        catalog: Arc<VersionCatalog>,
        downloader: Downloader,
        rules: RuleContext,
    ) -> Self {
        Self {
            store,
            catalog,
            downloader,
            rules,
            active: Mutex::new(HashMap::new()),
            version_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Download every file `version_id` needs into the store.
    ///
    /// Concurrent calls for the same id run one after another; the second
    /// finds everything valid and transfers nothing. Progress is reported
    /// after each file and once more with the terminal status.
    pub async fn download_version(
        &self,
        version_id: &str,
        progress: Option<&ProgressSender>,
    ) -> LauncherResult<()> {
        let lock = self.version_lock(version_id);
        let guard = lock.lock().await;

        let token = CancellationToken::new();
        self.lock_active().insert(version_id.to_string(), token.clone());

        let result = self.run(version_id, &token, progress).await;

        self.lock_active().remove(version_id);
        drop(guard);
        self.release_version_lock(version_id, &lock);

        match &result {
            Ok(()) => info!("Version {} is fully downloaded", version_id),
            Err(LauncherError::Cancelled(_)) => info!("Download of {} paused", version_id),
            Err(e) => warn!("Download of {} failed: {}", version_id, e),
        }
        result
    }

    /// Request cancellation of an in-flight download. Returns `false` when
    /// nothing is downloading under that id.
    pub fn cancel_download(&self, version_id: &str) -> bool {
        match self.lock_active().get(version_id) {
            Some(token) => {
                info!("Cancelling download of {}", version_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_downloading(&self, version_id: &str) -> bool {
        self.lock_active().contains_key(version_id)
    }

    /// Metadata and client jar are present.
    pub fn is_version_installed(&self, version_id: &str) -> bool {
        self.store.version_json_path(version_id).is_file()
            && self.store.version_jar_path(version_id).is_file()
    }

    /// Hash-check every file of an installed version.
    pub async fn validate_installation(&self, version_id: &str) -> bool {
        let Some(metadata) = self.catalog.installed_metadata(version_id).await else {
            return false;
        };
        let entries = match self.plan(&metadata).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot validate {}: {}", version_id, e);
                return false;
            }
        };

        for entry in &entries {
            let valid = match &entry.sha1 {
                Some(sha1) => sha1_matches(&entry.dest, sha1).await,
                None => entry.dest.is_file(),
            };
            if !valid {
                debug!("Validation failed for {:?}", entry.dest);
                return false;
            }
        }
        true
    }

    async fn run(
        &self,
        version_id: &str,
        token: &CancellationToken,
        progress: Option<&ProgressSender>,
    ) -> LauncherResult<()> {
        let metadata = self.catalog.version_metadata(version_id).await?;
        let entries = self.plan(&metadata).await?;

        let total_bytes = entries.iter().filter_map(|e| e.size).sum();
        let mut tracker = ProgressTracker::new(version_id, entries.len(), total_bytes);
        info!(
            "Downloading {}: {} files, {} declared",
            version_id,
            entries.len(),
            format_bytes(total_bytes)
        );
        emit(progress, tracker.snapshot(DownloadStatus::Downloading, None));

        for entry in &entries {
            if token.is_cancelled() {
                emit(progress, tracker.snapshot(DownloadStatus::Paused, None));
                return Err(LauncherError::Cancelled(version_id.to_string()));
            }

            if entry.dest.is_file() {
                // Existing files are hash-checked before anything is fetched.
                emit(
                    progress,
                    tracker.snapshot(DownloadStatus::Verifying, Some(entry.url.clone())),
                );
            }
            let outcome = match self.downloader.ensure_file(entry).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    emit(progress, tracker.snapshot(DownloadStatus::Failed, Some(entry.url.clone())));
                    return Err(e);
                }
            };

            let transferred = match outcome {
                FileOutcome::AlreadyValid => 0,
                FileOutcome::Downloaded { transferred, .. } => transferred,
            };
            tracker.file_done(entry.size.unwrap_or(0), transferred);
            emit(
                progress,
                tracker.snapshot(DownloadStatus::Downloading, Some(entry.url.clone())),
            );
        }

        emit(progress, tracker.snapshot(DownloadStatus::Completed, None));
        Ok(())
    }

    /// Every file the version needs, de-duplicated by destination.
    ///
    /// Fetches the asset index as a side effect since its contents decide
    /// the object list.
    async fn plan(&self, metadata: &VersionMetadata) -> LauncherResult<Vec<DownloadEntry>> {
        let mut entries = Vec::new();

        if let Some(client) = metadata.client_download() {
            entries.push(
                DownloadEntry::new(&client.url, self.store.version_jar_path(&metadata.id))
                    .with_sha1(Some(client.sha1.clone()))
                    .with_size(Some(client.size)),
            );
        }

        for lib in metadata.applicable_libraries(&self.rules) {
            let files = lib
                .main_file()
                .into_iter()
                .chain(lib.native_file(&self.rules));
            for file in files {
                let Some(url) = file.url else {
                    debug!("No download url for {} ({})", lib.name, file.path);
                    continue;
                };
                entries.push(
                    DownloadEntry::new(url, self.store.library_path(&file.path))
                        .with_sha1(file.sha1)
                        .with_size(file.size),
                );
            }
        }

        if let Some(index_info) = &metadata.asset_index {
            let index = AssetIndex::ensure(index_info, &self.store, &self.downloader).await?;
            entries.extend(index.object_entries(&self.store));
        }

        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.dest.clone()));
        Ok(entries)
    }

    fn version_lock(&self, version_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .version_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(version_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release_version_lock(&self, version_id: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self
            .version_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // The map and the caller are the only holders: nobody is queued.
        if Arc::strong_count(lock) == 2 {
            locks.remove(version_id);
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn emit(progress: Option<&ProgressSender>, snapshot: DownloadProgress) {
    if let Some(tx) = progress {
        let _ = tx.send(snapshot);
    }
}
