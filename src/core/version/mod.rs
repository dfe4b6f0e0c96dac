pub mod catalog;
pub mod manifest;
pub mod ordering;
pub mod rules;
pub mod version_file;

pub use catalog::VersionCatalog;
pub use manifest::{VersionDescriptor, VersionManifest, VersionType};
pub use rules::{Rule, RuleAction, RuleContext};
pub use version_file::{
    AssetIndexInfo, DownloadArtifact, LibraryEntry, LibraryFile, VersionMetadata,
};
