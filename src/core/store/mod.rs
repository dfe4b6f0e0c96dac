pub mod layout;
pub mod probe;

pub use layout::{file_len, sha1_bytes, sha1_file, sha1_matches, ArtifactStore};
pub use probe::{FileProbe, OsFileProbe};
