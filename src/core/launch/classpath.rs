// ─── Classpath Builder ───
// Ordered, de-duplicated jar list for the `-cp` argument.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::store::ArtifactStore;
use crate::core::version::{RuleContext, VersionMetadata};

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Every applicable library jar followed by the client jar.
///
/// The first occurrence of an artifact identity (group, artifact and
/// classifier) wins, so loader libraries listed ahead of the vanilla ones
/// replace older copies of the same artifact.
pub fn resolve_classpath(
    metadata: &VersionMetadata,
    store: &ArtifactStore,
    client_jar: &Path,
    rules: &RuleContext,
) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for lib in metadata.applicable_libraries(rules) {
        let Some(file) = lib.main_file() else {
            continue;
        };
        let identity = match lib.artifact() {
            Ok(artifact) => artifact.identity(),
            Err(_) => file.path.clone(),
        };
        if !seen.insert(identity) {
            debug!("Classpath already has {}, skipping", lib.name);
            continue;
        }
        entries.push(store.library_path(&file.path));
    }

    entries.push(client_jar.to_path_buf());
    entries
}

/// ModLauncher-based stacks are sensitive to classpath order. Ensure the
/// bootstrap artifacts come first.
pub fn prioritize_bootstrap_entries(entries: &mut Vec<PathBuf>) {
    fn score(entry: &Path) -> usize {
        let lower = entry.to_string_lossy().to_ascii_lowercase();
        if lower.contains("bootstraplauncher") {
            0
        } else if lower.contains("modlauncher") {
            1
        } else if lower.contains("securejarhandler") {
            2
        } else {
            10
        }
    }

    let mut indexed: Vec<(usize, usize, PathBuf)> = entries
        .drain(..)
        .enumerate()
        .map(|(idx, entry)| (score(&entry), idx, entry))
        .collect();

    indexed.sort_by_key(|(priority, idx, _)| (*priority, *idx));
    entries.extend(indexed.into_iter().map(|(_, _, entry)| entry));
}

pub fn join_classpath(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(get_classpath_separator())
}

/// Path as a launch argument. Java classpath handling fails on Windows
/// extended-length paths, so the `\\?\` prefix is stripped.
pub fn safe_path_str(path: &Path) -> String {
    let text = path.to_string_lossy().to_string();
    match text.strip_prefix(r"\\?\") {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
