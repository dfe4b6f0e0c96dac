// ─── Launcher ───
// Composition root: every long-lived service is built once here and shared
// by reference.

use std::sync::Arc;

use tracing::info;

use super::settings::LauncherConfig;
use crate::core::auth::CredentialProvider;
use crate::core::downloader::{DownloadEngine, Downloader, HttpSource, ProgressSender, RemoteSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::java::{JavaResolver, SystemJavaResolver};
use crate::core::launch::{
    CommandBuilder, ProcessEvent, ProcessRecord, ProcessRunner, ProcessSupervisor,
    TokioProcessRunner,
};
use crate::core::loaders::{InstallProgressSender, ModLoaderDescriptor, ModLoaderManager};
use crate::core::profile::ProfileStore;
use crate::core::store::{ArtifactStore, FileProbe, OsFileProbe};
use crate::core::version::{VersionCatalog, VersionDescriptor};

/// External collaborators and the seams tests replace.
pub struct Collaborators {
    pub source: Arc<dyn RemoteSource>,
    pub java: Arc<dyn JavaResolver>,
    pub probe: Arc<dyn FileProbe>,
    pub runner: Arc<dyn ProcessRunner>,
    pub profiles: Arc<dyn ProfileStore>,
    pub credentials: Arc<dyn CredentialProvider>,
}

pub struct Launcher {
    config: LauncherConfig,
    store: ArtifactStore,
    catalog: Arc<VersionCatalog>,
    downloads: DownloadEngine,
    loaders: ModLoaderManager,
    supervisor: ProcessSupervisor,
    profiles: Arc<dyn ProfileStore>,
    credentials: Arc<dyn CredentialProvider>,
}

impl Launcher {
    /// Production wiring: HTTP catalogs, system Java, real processes.
    pub fn new(
        config: LauncherConfig,
        profiles: Arc<dyn ProfileStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> LauncherResult<Self> {
        let client = build_http_client()?;
        Ok(Self::with_collaborators(
            config,
            Collaborators {
                source: Arc::new(HttpSource::new(client)),
                java: Arc::new(SystemJavaResolver),
                probe: Arc::new(OsFileProbe),
                runner: Arc::new(TokioProcessRunner),
                profiles,
                credentials,
            },
        ))
    }

    pub fn with_collaborators(config: LauncherConfig, c: Collaborators) -> Self {
        let store = ArtifactStore::new(&config.data_dir);
        let rules = config.rule_context();

        let catalog = Arc::new(
            VersionCatalog::new(store.clone(), c.source.clone(), &config.manifest_url)
                .with_ttl(config.manifest_ttl()),
        );
        let downloads = DownloadEngine::new(
            store.clone(),
            catalog.clone(),
            Downloader::new(c.source.clone()),
            rules.clone(),
        );
        let loaders = ModLoaderManager::new(c.source.clone(), c.java.clone());
        let builder = CommandBuilder::new(c.probe.clone(), rules)
            .with_launcher_identity(&config.launcher_name, &config.launcher_version);
        let supervisor = ProcessSupervisor::new(
            store.clone(),
            c.java,
            c.probe,
            c.runner,
            builder,
            config.supervisor_config(),
        );

        info!("Launcher ready (data dir {:?})", config.data_dir);
        Self {
            config,
            store,
            catalog,
            downloads,
            loaders,
            supervisor,
            profiles: c.profiles,
            credentials: c.credentials,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    pub fn downloads(&self) -> &DownloadEngine {
        &self.downloads
    }

    pub fn loaders(&self) -> &ModLoaderManager {
        &self.loaders
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProcessEvent> {
        self.supervisor.subscribe()
    }

    pub async fn fetch_manifest(&self, force_refresh: bool) -> LauncherResult<Vec<VersionDescriptor>> {
        self.catalog.fetch_manifest(force_refresh).await
    }

    pub async fn download_version(
        &self,
        version_id: &str,
        progress: Option<&ProgressSender>,
    ) -> LauncherResult<()> {
        self.downloads.download_version(version_id, progress).await
    }

    pub fn cancel_download(&self, version_id: &str) -> bool {
        self.downloads.cancel_download(version_id)
    }

    pub async fn detect_mod_loaders(&self, game_version: &str) -> Vec<ModLoaderDescriptor> {
        self.loaders.detect_mod_loaders(game_version).await
    }

    /// Install into the shared data root, next to the vanilla versions.
    pub async fn install_mod_loader(
        &self,
        descriptor: &ModLoaderDescriptor,
        progress: Option<&InstallProgressSender>,
    ) -> bool {
        self.loaders
            .install_mod_loader(descriptor, self.store.root(), progress)
            .await
    }

    /// Launch a stored profile with the current session.
    ///
    /// Identity and session are checked before the version document is
    /// read, in the same order the supervisor applies them.
    pub async fn launch_profile(&self, profile_id: &str) -> LauncherResult<ProcessRecord> {
        let profile = self.profiles.get_profile(profile_id).await?;
        let violations = profile.identity_violations();
        if !violations.is_empty() {
            return Err(LauncherError::validation(violations));
        }
        let credentials = self
            .credentials
            .get_valid_credentials()
            .await
            .ok_or(LauncherError::CredentialsMissing)?;
        credentials.ensure_valid()?;

        let metadata = self.catalog.version_metadata(&profile.version_id).await?;
        self.supervisor
            .launch_game(&profile, &metadata, Some(&credentials))
            .await
    }

    pub async fn kill_game_process(&self, pid: u32) -> bool {
        self.supervisor.kill_game_process(pid).await
    }

    /// Terminate every running game. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        self.supervisor.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{Credentials, StaticCredentialProvider};
    use crate::core::error::LauncherError;
    use crate::core::java::StaticJavaResolver;
    use crate::core::profile::{InMemoryProfileStore, Profile};
    use crate::core::testing::{temp_root, CountingProbe, MemorySource};
    use chrono::{Duration, Utc};

    fn credentials(valid_for: Duration) -> Credentials {
        Credentials {
            access_token: "tok".into(),
            expires_at: Utc::now() + valid_for,
            player_name: "Steve".into(),
            player_uuid: "uuid".into(),
            user_type: "msa".into(),
            xuid: None,
            client_id: None,
        }
    }

    fn launcher(
        name: &str,
        runner: Arc<dyn ProcessRunner>,
        session: Option<Credentials>,
    ) -> (Launcher, Arc<MemorySource>, Arc<InMemoryProfileStore>) {
        let mut config = LauncherConfig::load(&temp_root(name));
        config.kill_grace_period_ms = 1000;
        let source = Arc::new(MemorySource::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let launcher = Launcher::with_collaborators(
            config,
            Collaborators {
                source: source.clone(),
                java: Arc::new(StaticJavaResolver::new().with_fallback("/opt/java/bin/java")),
                probe: Arc::new(CountingProbe::everything_present()),
                runner,
                profiles: profiles.clone(),
                credentials: Arc::new(StaticCredentialProvider::new(session)),
            },
        );
        (launcher, source, profiles)
    }

    #[tokio::test]
    async fn unknown_profiles_and_stale_sessions_are_rejected() {
        let (launcher, source, profiles) = launcher(
            "launcher-reject",
            Arc::new(TokioProcessRunner),
            Some(credentials(-Duration::minutes(1))),
        );
        assert!(matches!(
            launcher.launch_profile("nope").await.unwrap_err(),
            LauncherError::ProfileNotFound(_)
        ));

        let profile = Profile::new("Vanilla", "1.20.1", launcher.store().root().join("game"));
        profiles.insert(profile.clone());
        assert!(matches!(
            launcher.launch_profile(&profile.id).await.unwrap_err(),
            LauncherError::CredentialsExpired { .. }
        ));
        assert_eq!(source.total_calls(), 0);
        assert_eq!(launcher.shutdown().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stored_profile_launches_from_installed_metadata() {
        use crate::core::testing::ScriptRunner;

        let runner = Arc::new(ScriptRunner::new("exit 0"));
        let (launcher, source, profiles) = launcher(
            "launcher-launch",
            runner.clone(),
            Some(credentials(Duration::hours(1))),
        );
        let json_path = launcher.store().version_json_path("1.20.1");
        std::fs::create_dir_all(json_path.parent().unwrap()).unwrap();
        std::fs::write(
            &json_path,
            r#"{"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main",
                "arguments": {"game": ["--username", "${auth_player_name}"], "jvm": []}}"#,
        )
        .unwrap();

        let profile = Profile::new("Vanilla", "1.20.1", launcher.store().root().join("game"));
        profiles.insert(profile.clone());
        let mut events = launcher.subscribe();

        let record = launcher.launch_profile(&profile.id).await.unwrap();
        assert_eq!(record.profile_id, profile.id);
        assert_eq!(source.total_calls(), 0);

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ProcessEvent::Started { .. }));
        let command = runner.last_command().unwrap();
        assert!(command.has_arg("Steve"));
        assert!(command.has_arg("-Dminecraft.launcher.brand=launcher-core"));

        loop {
            let event = tokio::time::timeout(std::time::Duration::from_secs(10), events.recv())
                .await
                .unwrap()
                .unwrap();
            if event.is_terminal() {
                assert!(matches!(event, ProcessEvent::Exited { exit_code: 0, .. }));
                break;
            }
        }
        let _ = std::fs::remove_dir_all(launcher.store().root());
    }
}
