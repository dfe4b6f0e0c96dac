use std::sync::Arc;

use async_trait::async_trait;

use crate::core::downloader::RemoteSource;
use crate::core::error::LauncherResult;

use super::{
    context::InstallContext,
    fabric::FabricInstaller,
    forge::ForgeInstaller,
    model::{ModLoaderDescriptor, ModLoaderType},
    quilt::QuiltInstaller,
};

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Loader builds published for `game_version`, newest first.
    async fn list_versions(&self, game_version: &str) -> LauncherResult<Vec<ModLoaderDescriptor>>;

    /// Produce `versions/<id>/<id>.json` (plus whatever it references) in
    /// the context's store.
    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()>;
}

/// Dispatcher sin Box<dyn>
pub enum Installer {
    Fabric(FabricInstaller),
    Quilt(QuiltInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn new(loader: ModLoaderType, source: Arc<dyn RemoteSource>) -> Self {
        match loader {
            ModLoaderType::Fabric => Self::Fabric(FabricInstaller::new(source)),
            ModLoaderType::Quilt => Self::Quilt(QuiltInstaller::new(source)),
            ModLoaderType::Forge => Self::Forge(ForgeInstaller::new(source)),
        }
    }

    pub fn loader_type(&self) -> ModLoaderType {
        match self {
            Installer::Fabric(_) => ModLoaderType::Fabric,
            Installer::Quilt(_) => ModLoaderType::Quilt,
            Installer::Forge(_) => ModLoaderType::Forge,
        }
    }

    pub async fn list_versions(&self, game_version: &str) -> LauncherResult<Vec<ModLoaderDescriptor>> {
        match self {
            Installer::Fabric(i) => i.list_versions(game_version).await,
            Installer::Quilt(i) => i.list_versions(game_version).await,
            Installer::Forge(i) => i.list_versions(game_version).await,
        }
    }

    pub async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Quilt(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
        }
    }
}
