// ─── Mod-Loader Manager ───
// Catalog queries across every loader ecosystem, installation with
// progress reporting, and discovery of loaders already installed.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::Installer;
use super::model::{
    installed_version_id, loader_type_from_main_class, parse_installed_version_id,
    InstallProgressSender, InstallReporter, InstallStage, ModLoaderDescriptor, ModLoaderType,
};
use crate::core::downloader::{Downloader, RemoteSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::JavaResolver;
use crate::core::store::ArtifactStore;
use crate::core::version::VersionMetadata;

pub struct ModLoaderManager {
    source: Arc<dyn RemoteSource>,
    java: Arc<dyn JavaResolver>,
}

impl ModLoaderManager {
    pub fn new(source: Arc<dyn RemoteSource>, java: Arc<dyn JavaResolver>) -> Self {
        Self { source, java }
    }

    /// Every loader build available for `game_version`, recommended and
    /// stable builds first.
    ///
    /// Each ecosystem is queried on its own; one failing only removes its
    /// entries from the result.
    pub async fn detect_mod_loaders(&self, game_version: &str) -> Vec<ModLoaderDescriptor> {
        let installers: Vec<Installer> = ModLoaderType::ALL
            .iter()
            .map(|t| Installer::new(*t, self.source.clone()))
            .collect();

        let results = join_all(
            installers
                .iter()
                .map(|installer| installer.list_versions(game_version)),
        )
        .await;

        let mut descriptors = Vec::new();
        for (installer, result) in installers.iter().zip(results) {
            match result {
                Ok(found) => {
                    debug!("{} {} builds for {}", found.len(), installer.loader_type(), game_version);
                    descriptors.extend(found);
                }
                Err(e) => warn!(
                    "{} catalog unavailable for {}: {}",
                    installer.loader_type(),
                    game_version,
                    e
                ),
            }
        }

        descriptors.sort_by_key(|d| (!d.recommended, !d.stable));
        descriptors
    }

    /// Install `descriptor` into `install_dir`.
    ///
    /// Never fails with an error: any problem is reported as a final
    /// [`InstallStage::Failed`] progress event and yields `false`.
    pub async fn install_mod_loader(
        &self,
        descriptor: &ModLoaderDescriptor,
        install_dir: &Path,
        progress: Option<&InstallProgressSender>,
    ) -> bool {
        let reporter = InstallReporter::new(descriptor, progress);
        match self.try_install(descriptor, install_dir, &reporter).await {
            Ok(()) => {
                info!("{} installed", descriptor.installed_version_id());
                reporter.report(InstallStage::Completed, 100, "Installed");
                true
            }
            Err(e) => {
                warn!(
                    "Installing {} {} failed: {}",
                    descriptor.loader_type, descriptor.version, e
                );
                reporter.report(InstallStage::Failed, 100, e.to_string());
                false
            }
        }
    }

    async fn try_install(
        &self,
        descriptor: &ModLoaderDescriptor,
        install_dir: &Path,
        reporter: &InstallReporter<'_>,
    ) -> LauncherResult<()> {
        reporter.report(InstallStage::Preparing, 0, "Preparing");

        let store = ArtifactStore::new(install_dir);
        let downloader = Downloader::new(self.source.clone());
        let ctx = InstallContext {
            descriptor,
            store: &store,
            downloader: &downloader,
            java: self.java.as_ref(),
            reporter,
        };

        Installer::new(descriptor.loader_type, self.source.clone())
            .install(&ctx)
            .await?;

        reporter.report(InstallStage::Verifying, 95, "Verifying installation");
        let version_id = descriptor.installed_version_id();
        let expected = store.version_json_path(&version_id);
        if !expected.is_file() {
            return Err(LauncherError::Loader(format!(
                "Installer finished but {} is missing",
                expected.display()
            )));
        }
        Ok(())
    }

    pub fn is_mod_loader_installed(
        &self,
        loader_type: ModLoaderType,
        game_version: &str,
        loader_version: &str,
        install_dir: &Path,
    ) -> bool {
        let id = installed_version_id(loader_type, game_version, loader_version);
        ArtifactStore::new(install_dir).version_json_path(&id).is_file()
    }

    /// Loaders found among the installed version documents, recognised by
    /// their main class.
    pub async fn get_installed_mod_loaders(&self, install_dir: &Path) -> Vec<ModLoaderDescriptor> {
        let store = ArtifactStore::new(install_dir);
        let mut entries = match tokio::fs::read_dir(store.versions_dir()).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut found = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(version_id) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let path = store.version_json_path(&version_id);
            if !path.is_file() {
                continue;
            }
            let metadata = match VersionMetadata::load(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping unreadable {:?}: {}", path, e);
                    continue;
                }
            };
            let Some(loader_type) = loader_type_from_main_class(&metadata.main_class, &metadata.id)
            else {
                continue;
            };
            let Some((game_version, loader_version)) = parse_installed_version_id(
                loader_type,
                &metadata.id,
                metadata.inherits_from.as_deref(),
            ) else {
                debug!("Unrecognised {} id {}", loader_type, metadata.id);
                continue;
            };

            found.push(ModLoaderDescriptor {
                loader_type,
                version: loader_version,
                game_version,
                stable: true,
                recommended: false,
                installer_url: None,
            });
        }

        found.sort_by(|a, b| {
            (a.loader_type.as_str(), &a.game_version, &a.version)
                .cmp(&(b.loader_type.as_str(), &b.game_version, &b.version))
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::java::StaticJavaResolver;
    use crate::core::loaders::fabric::FabricInstaller;
    use crate::core::loaders::model::InstallProgress;
    use crate::core::store::sha1_bytes;
    use crate::core::testing::{temp_root, MemorySource};
    use serde_json::json;
    use tokio::sync::mpsc;

    const FABRIC_LIST: &str = "https://meta.fabricmc.net/v2/versions/loader/1.20.1";
    const QUILT_LIST: &str = "https://meta.quiltmc.org/v3/versions/loader/1.20.1";
    const FORGE_XML: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml";
    const FORGE_PROMOS: &str =
        "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";

    fn manager(source: Arc<MemorySource>) -> ModLoaderManager {
        ModLoaderManager::new(source, Arc::new(StaticJavaResolver::new()))
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<InstallProgress>) -> Vec<InstallProgress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn one_failing_ecosystem_does_not_hide_the_others() {
        let source = Arc::new(
            MemorySource::new()
                .with_text(
                    FABRIC_LIST,
                    json!([{"loader": {"version": "0.14.21", "stable": true}}]).to_string(),
                )
                .failing(QUILT_LIST)
                .with_text(
                    FORGE_XML,
                    "<metadata><versioning><versions><version>1.20.1-47.2.0</version></versions></versioning></metadata>",
                )
                .with_text(FORGE_PROMOS, r#"{"promos":{}}"#),
        );

        let found = manager(source).detect_mod_loaders("1.20.1").await;

        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|d| d.loader_type == ModLoaderType::Fabric));
        assert!(found.iter().any(|d| d.loader_type == ModLoaderType::Forge));
        assert!(found[0].recommended);
    }

    #[tokio::test]
    async fn total_catalog_failure_yields_empty_list() {
        let source = Arc::new(MemorySource::new());
        source.set_offline(true);
        assert!(manager(source).detect_mod_loaders("1.20.1").await.is_empty());
    }

    #[tokio::test]
    async fn fabric_install_writes_version_document_and_libraries() {
        let root = temp_root("loader-fabric-install");
        let lib = b"fabric-loader-jar".to_vec();
        let profile = json!({
            "id": "fabric-loader-0.14.21-1.20.1",
            "inheritsFrom": "1.20.1",
            "type": "release",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]},
            "libraries": [{
                "name": "net.fabricmc:fabric-loader:0.14.21",
                "url": "https://maven.fabricmc.net/",
                "sha1": sha1_bytes(&lib),
                "size": lib.len()
            }]
        });
        let source = Arc::new(
            MemorySource::new()
                .with_text(
                    &FabricInstaller::profile_url("1.20.1", "0.14.21"),
                    profile.to_string(),
                )
                .with_file(
                    "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.14.21/fabric-loader-0.14.21.jar",
                    lib,
                ),
        );
        let manager = manager(source);
        let descriptor = ModLoaderDescriptor::new(ModLoaderType::Fabric, "1.20.1", "0.14.21");
        let (tx, rx) = mpsc::unbounded_channel();

        assert!(manager.install_mod_loader(&descriptor, &root, Some(&tx)).await);

        let store = ArtifactStore::new(&root);
        assert!(store
            .library_path("net/fabricmc/fabric-loader/0.14.21/fabric-loader-0.14.21.jar")
            .is_file());
        assert!(manager.is_mod_loader_installed(ModLoaderType::Fabric, "1.20.1", "0.14.21", &root));
        assert!(!manager.is_mod_loader_installed(ModLoaderType::Quilt, "1.20.1", "0.14.21", &root));

        let events = drain(rx);
        assert_eq!(events.first().map(|e| e.stage), Some(InstallStage::Preparing));
        assert_eq!(events.last().map(|e| e.stage), Some(InstallStage::Completed));

        let installed = manager.get_installed_mod_loaders(&root).await;
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].loader_type, ModLoaderType::Fabric);
        assert_eq!(installed[0].version, "0.14.21");
        assert_eq!(installed[0].game_version, "1.20.1");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn failed_install_reports_failure_and_returns_false() {
        let root = temp_root("loader-install-fail");
        let source = Arc::new(MemorySource::new());
        source.set_offline(true);
        let descriptor = ModLoaderDescriptor::new(ModLoaderType::Quilt, "1.20.1", "0.19.1");
        let (tx, rx) = mpsc::unbounded_channel();

        assert!(!manager(source).install_mod_loader(&descriptor, &root, Some(&tx)).await);

        let last = drain(rx).pop().unwrap();
        assert_eq!(last.stage, InstallStage::Failed);
        assert!(last.message.contains("unreachable"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn forge_without_java_fails_cleanly() {
        let root = temp_root("loader-forge-nojava");
        let descriptor = ModLoaderDescriptor::new(ModLoaderType::Forge, "1.20.1", "47.2.0");
        let (tx, rx) = mpsc::unbounded_channel();

        let ok = manager(Arc::new(MemorySource::new()))
            .install_mod_loader(&descriptor, &root, Some(&tx))
            .await;

        assert!(!ok);
        assert!(drain(rx).pop().unwrap().message.contains("major version 17"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forge_install_is_confirmed_by_the_version_document() {
        let root = temp_root("loader-forge-run");
        let descriptor = ModLoaderDescriptor::new(ModLoaderType::Forge, "1.20.1", "47.2.0");
        let installer_url = crate::core::loaders::forge::ForgeInstaller::installer_url("1.20.1", "47.2.0");
        let source = Arc::new(MemorySource::new().with_file(&installer_url, b"PK".to_vec()));
        let java = StaticJavaResolver::new().with_runtime(17, "/bin/true");
        let manager = ModLoaderManager::new(source, Arc::new(java));

        // The stand-in installer exits 0 but writes nothing.
        assert!(!manager.install_mod_loader(&descriptor, &root, None).await);
        assert!(root.join("launcher_profiles.json").is_file());

        let store = ArtifactStore::new(&root);
        let id = descriptor.installed_version_id();
        std::fs::create_dir_all(store.version_dir(&id)).unwrap();
        std::fs::write(
            store.version_json_path(&id),
            json!({"id": id, "inheritsFrom": "1.20.1", "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher"}).to_string(),
        )
        .unwrap();
        assert!(manager.install_mod_loader(&descriptor, &root, None).await);
        assert!(!store.installers_dir().join("forge-1.20.1-47.2.0-installer.jar").exists());

        let installed = manager.get_installed_mod_loaders(&root).await;
        assert_eq!(installed[0].loader_type, ModLoaderType::Forge);
        assert_eq!(installed[0].version, "47.2.0");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_forge_installer_is_reported() {
        let root = temp_root("loader-forge-false");
        let descriptor = ModLoaderDescriptor::new(ModLoaderType::Forge, "1.20.1", "47.2.0");
        let installer_url = crate::core::loaders::forge::ForgeInstaller::installer_url("1.20.1", "47.2.0");
        let source = Arc::new(MemorySource::new().with_file(&installer_url, b"PK".to_vec()));
        let java = StaticJavaResolver::new().with_fallback("/bin/false");
        let (tx, rx) = mpsc::unbounded_channel();

        let ok = ModLoaderManager::new(source, Arc::new(java))
            .install_mod_loader(&descriptor, &root, Some(&tx))
            .await;

        assert!(!ok);
        assert!(drain(rx).pop().unwrap().message.contains("Forge installer failed"));
        let _ = std::fs::remove_dir_all(&root);
    }
}
