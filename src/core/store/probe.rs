use std::path::Path;

/// Read-only view of the filesystem used by launch validation.
///
/// Launch preconditions only ever ask whether a file is present, so the
/// question is routed through this seam and can be counted in tests.
pub trait FileProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileProbe;

impl FileProbe for OsFileProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
