pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod manager;
pub mod model;
pub mod quilt;

pub use context::InstallContext;
pub use installer::{Installer, LoaderInstaller};
pub use manager::ModLoaderManager;
pub use model::{
    installed_version_id, InstallProgress, InstallProgressSender, InstallStage,
    ModLoaderDescriptor, ModLoaderType,
};
