use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::SupervisorConfig;
use crate::core::version::manifest::VERSION_MANIFEST_URL;
use crate::core::version::RuleContext;

const APP_DIR_NAME: &str = "launcher-core";
const SETTINGS_FILE: &str = "launcher_settings.json";

/// Launcher-wide settings, stored as `launcher_settings.json` in the data
/// directory. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    pub data_dir: PathBuf,
    pub manifest_url: String,
    pub manifest_ttl_secs: u64,
    pub kill_grace_period_ms: u64,
    pub stderr_tail_lines: usize,
    pub launcher_name: String,
    pub launcher_version: String,
    /// Feature flags for argument rules (`is_demo_user`, ...).
    pub features: BTreeMap<String, bool>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            manifest_ttl_secs: 30 * 60,
            kill_grace_period_ms: 5000,
            stderr_tail_lines: 200,
            launcher_name: env!("CARGO_PKG_NAME").to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
            features: BTreeMap::new(),
        }
    }
}

impl LauncherConfig {
    /// Settings from `data_dir`. A missing or unreadable file yields the
    /// defaults rooted at `data_dir`.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<LauncherConfig>(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {:?}: {}", path, e);
                LauncherConfig::default()
            }),
            Err(_) => LauncherConfig::default(),
        };
        config.data_dir = data_dir.to_path_buf();
        config
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn save(&self) -> LauncherResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| LauncherError::Io {
            path: self.data_dir.clone(),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(self)?;
        let path = self.settings_path();
        std::fs::write(&path, json).map_err(|e| LauncherError::Io {
            path: path.clone(),
            source: e,
        })?;
        info!("Saved launcher settings to {:?}", path);
        Ok(())
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    pub fn manifest_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.manifest_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Rule context of the running platform with the configured features.
    pub fn rule_context(&self) -> RuleContext {
        self.features
            .iter()
            .fold(RuleContext::current(), |ctx, (name, enabled)| {
                ctx.with_feature(name, *enabled)
            })
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            kill_grace: Duration::from_millis(self.kill_grace_period_ms),
            stderr_tail_lines: self.stderr_tail_lines,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
