pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::auth::{CredentialProvider, Credentials};
pub use crate::core::error::{ErrorKind, LauncherError, LauncherResult};
pub use crate::core::launch::{CrashReport, LaunchCommand, ProcessEvent, ProcessRecord};
pub use crate::core::loaders::{ModLoaderDescriptor, ModLoaderType};
pub use crate::core::profile::{Profile, ProfileStore};
pub use crate::core::state::{Launcher, LauncherConfig};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter;
/// later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launcher_core=debug")),
        )
        .try_init();
}
