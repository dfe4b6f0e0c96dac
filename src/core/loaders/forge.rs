use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::LoaderInstaller;
use super::model::{InstallStage, ModLoaderDescriptor, ModLoaderType};
use crate::core::downloader::{DownloadEntry, RemoteSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::required_java_for_minecraft_version;
use crate::core::version::ordering::compare_versions;

const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
const FORGE_METADATA_URL: &str =
    "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml";
const FORGE_PROMOTIONS_URL: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";

/// Lines of installer output kept in the error when it fails.
const INSTALLER_OUTPUT_TAIL: usize = 20;

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: MavenVersioning,
}

#[derive(Debug, Deserialize)]
struct MavenVersioning {
    versions: MavenVersions,
}

#[derive(Debug, Deserialize)]
struct MavenVersions {
    #[serde(rename = "version", default)]
    version: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Promotions {
    #[serde(default)]
    promos: HashMap<String, String>,
}

/// Installs Forge by downloading and executing the official installer JAR.
pub struct ForgeInstaller {
    source: Arc<dyn RemoteSource>,
}

impl ForgeInstaller {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    pub fn installer_url(game_version: &str, loader_version: &str) -> String {
        let forge_id = format!("{}-{}", game_version, loader_version);
        format!(
            "{}/net/minecraftforge/forge/{}/forge-{}-installer.jar",
            FORGE_MAVEN, forge_id, forge_id
        )
    }

    async fn promotions(&self) -> Promotions {
        let raw = match self.source.fetch_text(FORGE_PROMOTIONS_URL).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Forge promotions unavailable: {}", e);
                return Promotions::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Forge promotions unreadable: {}", e);
            Promotions::default()
        })
    }
}

/// Builds of `game_version` listed in the Maven metadata, newest first.
fn builds_for_game_version(xml: &str, game_version: &str) -> LauncherResult<Vec<String>> {
    let metadata: MavenMetadata = quick_xml::de::from_str(xml)
        .map_err(|e| LauncherError::LoaderApi(format!("Unable to parse Forge metadata: {e}")))?;

    let prefix = format!("{}-", game_version);
    let mut builds: Vec<String> = metadata
        .versioning
        .versions
        .version
        .into_iter()
        .filter_map(|v| v.strip_prefix(&prefix).map(str::to_owned))
        .collect();
    builds.sort_by(|a, b| compare_versions(b, a));
    builds.dedup();
    Ok(builds)
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn list_versions(&self, game_version: &str) -> LauncherResult<Vec<ModLoaderDescriptor>> {
        let xml = self.source.fetch_text(FORGE_METADATA_URL).await?;
        let builds = builds_for_game_version(&xml, game_version)?;
        if builds.is_empty() {
            return Ok(Vec::new());
        }

        let promotions = self.promotions().await;
        let recommended = promotions.promos.get(&format!("{game_version}-recommended"));

        Ok(builds
            .into_iter()
            .map(|version| ModLoaderDescriptor {
                loader_type: ModLoaderType::Forge,
                recommended: recommended == Some(&version),
                installer_url: Some(Self::installer_url(game_version, &version)),
                game_version: game_version.to_string(),
                stable: true,
                version,
            })
            .collect())
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let descriptor = ctx.descriptor;
        let reporter = ctx.reporter;
        info!(
            "Installing Forge {} for MC {}",
            descriptor.version, descriptor.game_version
        );

        let required_java = required_java_for_minecraft_version(&descriptor.game_version);
        let java_bin = ctx
            .java
            .resolve(required_java)
            .ok_or(LauncherError::JavaNotFound(required_java))?;

        let url = descriptor
            .installer_url
            .clone()
            .unwrap_or_else(|| Self::installer_url(&descriptor.game_version, &descriptor.version));
        let installer_path = ctx.store.installers_dir().join(format!(
            "forge-{}-{}-installer.jar",
            descriptor.game_version, descriptor.version
        ));

        reporter.report(InstallStage::Downloading, 10, "Downloading Forge installer");
        ctx.downloader
            .ensure_file(&DownloadEntry::new(url, &installer_path))
            .await?;

        ensure_launcher_profiles(ctx.store.root()).await?;

        reporter.report(InstallStage::Installing, 40, "Running Forge installer");
        let result = run_installer(&java_bin, &installer_path, ctx.store.root()).await;

        let _ = tokio::fs::remove_file(&installer_path).await;
        result
    }
}

/// The installer refuses to run without a launcher profile file.
async fn ensure_launcher_profiles(install_dir: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(install_dir)
        .await
        .map_err(|e| LauncherError::Io {
            path: install_dir.to_path_buf(),
            source: e,
        })?;

    let launcher_profiles_path = install_dir.join("launcher_profiles.json");
    if !launcher_profiles_path.exists() {
        tokio::fs::write(
            &launcher_profiles_path,
            br#"{"profiles":{},"selectedProfile":null}"#,
        )
        .await
        .map_err(|e| LauncherError::Io {
            path: launcher_profiles_path.clone(),
            source: e,
        })?;
    }
    Ok(())
}

async fn run_installer(java_bin: &Path, installer: &Path, install_dir: &Path) -> LauncherResult<()> {
    debug!("{:?} -jar {:?} --installClient {:?}", java_bin, installer, install_dir);
    let output = tokio::process::Command::new(java_bin)
        .arg("-jar")
        .arg(installer)
        .arg("--installClient")
        .arg(install_dir)
        .current_dir(install_dir)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| LauncherError::JavaExecution(format!("{}: {}", java_bin.display(), e)))?;

    if output.status.success() {
        return Ok(());
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let lines: Vec<&str> = combined.lines().collect();
    let tail = lines[lines.len().saturating_sub(INSTALLER_OUTPUT_TAIL)..].join("\n");
    Err(LauncherError::Loader(format!(
        "Forge installer failed (code {:?})\n{}",
        output.status.code(),
        tail
    )))
}
