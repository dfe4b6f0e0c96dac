use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::context::InstallContext;
use super::installer::LoaderInstaller;
use super::model::{InstallStage, ModLoaderDescriptor, ModLoaderType};
use crate::core::downloader::{DownloadEntry, RemoteSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionMetadata;

const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";

#[derive(Debug, Deserialize)]
struct FabricLoaderEntry {
    loader: FabricLoaderVersion,
}

#[derive(Debug, Deserialize)]
struct FabricLoaderVersion {
    version: String,
    #[serde(default)]
    stable: bool,
}

pub struct FabricInstaller {
    source: Arc<dyn RemoteSource>,
}

impl FabricInstaller {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    pub fn profile_url(game_version: &str, loader_version: &str) -> String {
        format!(
            "{}/versions/loader/{}/{}/profile/json",
            FABRIC_META_BASE, game_version, loader_version
        )
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn list_versions(&self, game_version: &str) -> LauncherResult<Vec<ModLoaderDescriptor>> {
        let url = format!("{}/versions/loader/{}", FABRIC_META_BASE, game_version);
        let raw = self.source.fetch_text(&url).await?;
        let entries: Vec<FabricLoaderEntry> = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::LoaderApi(format!("Unreadable Fabric loader list: {e}")))?;

        let builds = entries
            .into_iter()
            .map(|e| (e.loader.version, e.loader.stable))
            .collect::<Vec<_>>();
        Ok(descriptors_from_builds(
            ModLoaderType::Fabric,
            game_version,
            builds,
            Self::profile_url,
        ))
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let descriptor = ctx.descriptor;
        info!(
            "Installing Fabric {} for Minecraft {}",
            descriptor.version, descriptor.game_version
        );
        let url = descriptor
            .installer_url
            .clone()
            .unwrap_or_else(|| Self::profile_url(&descriptor.game_version, &descriptor.version));
        install_profile_document(ctx, self.source.as_ref(), &url).await
    }
}

/// Turn a meta API build list into descriptors. The first stable build is
/// the recommended one.
pub(super) fn descriptors_from_builds(
    loader_type: ModLoaderType,
    game_version: &str,
    builds: Vec<(String, bool)>,
    profile_url: fn(&str, &str) -> String,
) -> Vec<ModLoaderDescriptor> {
    let recommended = builds
        .iter()
        .find(|(_, stable)| *stable)
        .map(|(version, _)| version.clone());

    builds
        .into_iter()
        .map(|(version, stable)| ModLoaderDescriptor {
            loader_type,
            recommended: recommended.as_deref() == Some(version.as_str()),
            installer_url: Some(profile_url(game_version, &version)),
            game_version: game_version.to_string(),
            version,
            stable,
        })
        .collect()
}

/// Shared by the meta-API loaders: the profile endpoint already serves a
/// complete version document that inherits from the vanilla one.
pub(super) async fn install_profile_document(
    ctx: &InstallContext<'_>,
    source: &dyn RemoteSource,
    profile_url: &str,
) -> LauncherResult<()> {
    let reporter = ctx.reporter;
    reporter.report(InstallStage::Downloading, 10, "Fetching loader profile");

    let raw = source.fetch_text(profile_url).await?;
    let mut profile = VersionMetadata::from_json(&raw)
        .map_err(|e| LauncherError::LoaderApi(format!("Unreadable loader profile: {e}")))?;
    if profile.main_class.is_empty() {
        return Err(LauncherError::LoaderApi(format!(
            "Loader profile at {profile_url} has no main class"
        )));
    }

    let version_id = ctx.descriptor.installed_version_id();
    profile.id = version_id.clone();
    if profile.inherits_from.is_none() {
        profile.inherits_from = Some(ctx.descriptor.game_version.clone());
    }

    let files = profile
        .libraries
        .iter()
        .filter_map(|lib| lib.main_file())
        .filter_map(|file| {
            let url = file.url?;
            Some(
                DownloadEntry::new(url, ctx.store.library_path(&file.path))
                    .with_sha1(file.sha1)
                    .with_size(file.size),
            )
        })
        .collect::<Vec<_>>();

    let total = files.len().max(1);
    for (i, entry) in files.iter().enumerate() {
        debug!("Loader library {}", entry.url);
        ctx.downloader.ensure_file(entry).await?;
        let pct = 10 + (80 * (i + 1) / total) as u8;
        reporter.report(InstallStage::Downloading, pct, format!("Library {}/{}", i + 1, files.len()));
    }

    reporter.report(InstallStage::Installing, 90, "Writing version document");
    let path = ctx.store.version_json_path(&version_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    let json = serde_json::to_string_pretty(&profile)?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| LauncherError::Io {
            path: path.clone(),
            source: e,
        })?;

    info!("{} installed ({} libraries)", version_id, files.len());
    Ok(())
}
