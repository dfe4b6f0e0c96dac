// ─── Natives ───
// Recognizes native-library archives across the three library-format eras
// and extracts their shared libraries into the version's natives directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::ArtifactStore;
use crate::core::version::{LibraryEntry, LibraryFile, RuleContext, VersionMetadata};

/// Written after the last archive is extracted.
pub const EXTRACTED_MARKER: &str = ".extracted";

const NATIVE_EXTENSIONS: [&str; 4] = [".dll", ".so", ".dylib", ".jnilib"];

/// Which library shape identified the native archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeRule {
    /// Modern coordinates: `org.lwjgl:lwjgl:3.3.1:natives-linux`.
    ExplicitClassifier,
    /// `natives` map pointing into `downloads.classifiers`.
    LegacyNativesField,
    /// Old `*-platform` artifacts or `natives-<os>` file names.
    PlatformNaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeClassification {
    NotNative,
    Native { rule: NativeRule, file: LibraryFile },
}

/// Decide whether `lib` carries native code for the platform in `rules`.
pub fn classify_library(lib: &LibraryEntry, rules: &RuleContext) -> NativeClassification {
    if let Some(file) = lib.native_file(rules) {
        return NativeClassification::Native {
            rule: NativeRule::LegacyNativesField,
            file,
        };
    }
    if lib.natives.is_some() {
        // Natives map without an entry for this OS.
        return NativeClassification::NotNative;
    }

    let Ok(artifact) = lib.artifact() else {
        return NativeClassification::NotNative;
    };
    let Some(file) = lib.main_file() else {
        return NativeClassification::NotNative;
    };

    if artifact
        .classifier
        .as_deref()
        .is_some_and(|c| c.starts_with("natives-"))
    {
        return NativeClassification::Native {
            rule: NativeRule::ExplicitClassifier,
            file,
        };
    }

    let os_marker = format!("natives-{}", rules.os_name);
    if artifact.artifact_id.ends_with("-platform") || file.path.contains(&os_marker) {
        return NativeClassification::Native {
            rule: NativeRule::PlatformNaming,
            file,
        };
    }

    NativeClassification::NotNative
}

/// Result of [`ensure_natives_extracted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativesExtraction {
    /// The directory was already complete and left untouched.
    pub reused: bool,
    pub archives: usize,
    pub files: usize,
}

/// Extract every native archive of `metadata` into `natives_dir`.
///
/// A complete directory (marker present) is reused unless `force` is set.
/// Fails without touching the directory when a native archive is not on
/// disk. Callers serialize concurrent extractions of one version.
pub async fn ensure_natives_extracted(
    metadata: &VersionMetadata,
    store: &ArtifactStore,
    natives_dir: &Path,
    rules: &RuleContext,
    force: bool,
) -> LauncherResult<NativesExtraction> {
    let marker = natives_dir.join(EXTRACTED_MARKER);
    if !force && marker.is_file() {
        debug!("Natives already extracted in {:?}", natives_dir);
        return Ok(NativesExtraction {
            reused: true,
            archives: 0,
            files: 0,
        });
    }

    let mut jobs: Vec<(PathBuf, Vec<String>)> = Vec::new();
    let mut missing = Vec::new();
    for lib in metadata.applicable_libraries(rules) {
        let NativeClassification::Native { rule, file } = classify_library(lib, rules) else {
            continue;
        };
        let archive = store.library_path(&file.path);
        if !archive.is_file() {
            warn!("Native archive for {} is missing: {:?}", lib.name, archive);
            missing.push(archive);
            continue;
        }
        debug!("{} is native ({:?})", lib.name, rule);
        let exclude = lib
            .extract
            .as_ref()
            .map(|e| e.exclude.clone())
            .unwrap_or_default();
        jobs.push((archive, exclude));
    }
    // An incomplete set must never be marked as extracted.
    if !missing.is_empty() {
        return Err(LauncherError::MissingNatives { paths: missing });
    }

    if natives_dir.exists() {
        tokio::fs::remove_dir_all(natives_dir)
            .await
            .map_err(|e| LauncherError::Io {
                path: natives_dir.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LauncherError::Io {
            path: natives_dir.to_path_buf(),
            source: e,
        })?;

    let dest = natives_dir.to_path_buf();
    let archives = jobs.len();
    let files = tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
        let mut total = 0;
        for (archive, exclude) in &jobs {
            total += extract_archive(archive, &dest, exclude)?;
        }
        Ok(total)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;

    tokio::fs::write(&marker, b"")
        .await
        .map_err(|e| LauncherError::Io {
            path: marker.clone(),
            source: e,
        })?;

    info!(
        "Extracted {} native files from {} archives into {:?}",
        files, archives, natives_dir
    );
    Ok(NativesExtraction {
        reused: false,
        archives,
        files,
    })
}

fn is_native_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    NATIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Copy the shared libraries of one archive into `dest`, flattened to
/// their file names.
fn extract_archive(archive_path: &Path, dest: &Path, exclude: &[String]) -> LauncherResult<usize> {
    let file = std::fs::File::open(archive_path).map_err(|e| LauncherError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(io::BufReader::new(file))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.starts_with("META-INF") || exclude.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }
        if !is_native_file(&name) {
            continue;
        }
        let Some(file_name) = Path::new(&name).file_name() else {
            continue;
        };

        let target = dest.join(file_name);
        let mut out = std::fs::File::create(&target).map_err(|e| LauncherError::Io {
            path: target.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| LauncherError::Io {
            path: target.clone(),
            source: e,
        })?;
        debug!("Extracted native: {}", name);
        extracted += 1;
    }
    Ok(extracted)
}
