use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{info, warn};

use super::model::Profile;
use crate::core::error::{LauncherError, LauncherResult};

/// Read access to stored profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> LauncherResult<Profile>;
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: &str) -> LauncherResult<Profile> {
        self.profiles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| LauncherError::ProfileNotFound(id.to_string()))
    }
}

/// Profiles persisted as `<root>/<id>/profile.json`.
pub struct DirectoryProfileStore {
    root: PathBuf,
}

impl DirectoryProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn profile_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join("profile.json")
    }

    pub async fn save(&self, profile: &Profile) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(profile)?;
        let config_path = self.profile_path(&profile.id);

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path,
                source: e,
            })?;

        info!("Saved profile '{}' ({})", profile.name, profile.id);
        Ok(())
    }

    /// Every readable profile; corrupt files are skipped with a warning.
    pub async fn list(&self) -> LauncherResult<Vec<Profile>> {
        let mut profiles = Vec::new();
        if !self.root.exists() {
            return Ok(profiles);
        }

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| LauncherError::Io {
                path: self.root.clone(),
                source: e,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| LauncherError::Io {
            path: self.root.clone(),
            source: e,
        })? {
            let config_path = entry.path().join("profile.json");
            if !config_path.is_file() {
                continue;
            }
            match tokio::fs::read_to_string(&config_path).await {
                Ok(json) => match serde_json::from_str::<Profile>(&json) {
                    Ok(profile) => profiles.push(profile),
                    Err(e) => warn!("Corrupt profile.json at {:?}: {}", config_path, e),
                },
                Err(e) => warn!("Cannot read {:?}: {}", config_path, e),
            }
        }

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }
}

#[async_trait]
impl ProfileStore for DirectoryProfileStore {
    async fn get_profile(&self, id: &str) -> LauncherResult<Profile> {
        let config_path = self.profile_path(id);
        if !config_path.exists() {
            return Err(LauncherError::ProfileNotFound(id.to_string()));
        }

        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path.clone(),
                source: e,
            })?;
        Ok(serde_json::from_str(&json)?)
    }
}
