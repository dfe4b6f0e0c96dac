use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::loaders::{ModLoaderDescriptor, ModLoaderType};

pub const DEFAULT_MIN_MEMORY_MB: u32 = 512;
pub const DEFAULT_MAX_MEMORY_MB: u32 = 2048;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A named launch configuration. Owned by the profile store; the launcher
/// only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    /// Vanilla version the profile runs, e.g. `1.20.1`.
    pub version_id: String,
    /// Game working directory (saves, mods, options).
    pub install_dir: PathBuf,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    #[serde(default)]
    pub extra_jvm_args: Vec<String>,
    #[serde(default)]
    pub mod_loader: Option<ModLoaderDescriptor>,
    /// Overrides Java resolution when set.
    #[serde(default)]
    pub java_path: Option<PathBuf>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl Profile {
    pub fn new(name: &str, version_id: &str, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            version_id: version_id.to_string(),
            install_dir: install_dir.into(),
            min_memory_mb: DEFAULT_MIN_MEMORY_MB,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            extra_jvm_args: Vec::new(),
            mod_loader: None,
            java_path: None,
            resolution: None,
        }
    }

    pub fn with_mod_loader(mut self, loader_type: ModLoaderType, loader_version: &str) -> Self {
        self.mod_loader = Some(ModLoaderDescriptor::new(
            loader_type,
            &self.version_id,
            loader_version,
        ));
        self
    }

    pub fn with_memory(mut self, min_mb: u32, max_mb: u32) -> Self {
        self.min_memory_mb = min_mb;
        self.max_memory_mb = max_mb;
        self
    }

    /// Id of the version document to launch: the loader's when one is set.
    pub fn launch_version_id(&self) -> String {
        match &self.mod_loader {
            Some(loader) => loader.installed_version_id(),
            None => self.version_id.clone(),
        }
    }

    /// Identity fields that must be present before anything else is checked.
    pub fn identity_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.id.trim().is_empty() {
            violations.push("Profile id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            violations.push("Profile name is empty".to_string());
        }
        if self.version_id.trim().is_empty() {
            violations.push("Profile has no game version".to_string());
        }
        violations
    }
}
