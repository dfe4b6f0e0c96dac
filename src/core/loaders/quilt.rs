use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::context::InstallContext;
use super::fabric::{descriptors_from_builds, install_profile_document};
use super::installer::LoaderInstaller;
use super::model::{ModLoaderDescriptor, ModLoaderType};
use crate::core::downloader::RemoteSource;
use crate::core::error::{LauncherError, LauncherResult};

/// Quilt loader via the Quilt Meta API (nearly identical to Fabric's API).
pub struct QuiltInstaller {
    source: Arc<dyn RemoteSource>,
}

const QUILT_META_BASE: &str = "https://meta.quiltmc.org/v3";

#[derive(Debug, Deserialize)]
struct QuiltLoaderEntry {
    loader: QuiltLoaderVersion,
}

#[derive(Debug, Deserialize)]
struct QuiltLoaderVersion {
    version: String,
}

impl QuiltInstaller {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    pub fn profile_url(game_version: &str, loader_version: &str) -> String {
        format!(
            "{}/versions/loader/{}/{}/profile/json",
            QUILT_META_BASE, game_version, loader_version
        )
    }
}

/// Quilt's meta carries no stability flag; pre-release builds are marked in
/// the version string.
fn is_stable_build(version: &str) -> bool {
    let lower = version.to_ascii_lowercase();
    !["beta", "alpha", "pre", "rc"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[async_trait]
impl LoaderInstaller for QuiltInstaller {
    async fn list_versions(&self, game_version: &str) -> LauncherResult<Vec<ModLoaderDescriptor>> {
        let url = format!("{}/versions/loader/{}", QUILT_META_BASE, game_version);
        let raw = self.source.fetch_text(&url).await?;
        let entries: Vec<QuiltLoaderEntry> = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::LoaderApi(format!("Unreadable Quilt loader list: {e}")))?;

        let builds = entries
            .into_iter()
            .map(|e| {
                let stable = is_stable_build(&e.loader.version);
                (e.loader.version, stable)
            })
            .collect::<Vec<_>>();
        Ok(descriptors_from_builds(
            ModLoaderType::Quilt,
            game_version,
            builds,
            Self::profile_url,
        ))
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let descriptor = ctx.descriptor;
        info!(
            "Installing Quilt loader {} for MC {}",
            descriptor.version, descriptor.game_version
        );
        let url = descriptor
            .installer_url
            .clone()
            .unwrap_or_else(|| Self::profile_url(&descriptor.game_version, &descriptor.version));
        install_profile_document(ctx, self.source.as_ref(), &url).await
    }
}
