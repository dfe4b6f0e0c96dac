use crate::core::downloader::Downloader;
use crate::core::java::JavaResolver;
use crate::core::store::ArtifactStore;

use super::model::{InstallReporter, ModLoaderDescriptor};

/// Everything one loader installation needs.
pub struct InstallContext<'a> {
    pub descriptor: &'a ModLoaderDescriptor,
    /// Rooted at the install directory.
    pub store: &'a ArtifactStore,
    pub downloader: &'a Downloader,
    pub java: &'a dyn JavaResolver,
    pub reporter: &'a InstallReporter<'a>,
}
