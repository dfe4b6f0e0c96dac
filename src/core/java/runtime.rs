use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, instrument};

/// A Java runtime found on this machine.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
}

/// Finds a Java executable for a required major version.
pub trait JavaResolver: Send + Sync {
    fn resolve(&self, required_major: u32) -> Option<PathBuf>;
}

/// Looks at `JAVA_<major>_HOME`, `JAVA_HOME`, well-known install roots and
/// finally `PATH`, probing each candidate with `java -version`.
#[derive(Debug, Clone, Default)]
pub struct SystemJavaResolver;

impl JavaResolver for SystemJavaResolver {
    fn resolve(&self, required_major: u32) -> Option<PathBuf> {
        if let Ok(home) = std::env::var(format!("JAVA_{required_major}_HOME")) {
            let candidate = locate_java_binary(Path::new(&home));
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        detect_java_installations()
            .into_iter()
            .filter(|installation| is_java_compatible_major(installation.major, required_major))
            .min_by_key(|installation| installation.major)
            .map(|installation| installation.path)
    }
}

/// Fixed mapping from major version to executable; used when the profile
/// or the embedding application already knows which runtimes to use.
#[derive(Debug, Clone, Default)]
pub struct StaticJavaResolver {
    by_major: HashMap<u32, PathBuf>,
    fallback: Option<PathBuf>,
}

impl StaticJavaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(mut self, major: u32, path: impl Into<PathBuf>) -> Self {
        self.by_major.insert(major, path.into());
        self
    }

    pub fn with_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback = Some(path.into());
        self
    }
}

impl JavaResolver for StaticJavaResolver {
    fn resolve(&self, required_major: u32) -> Option<PathBuf> {
        self.by_major
            .get(&required_major)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}

// ─── Version heuristics ───

/// Java major version a game version needs when its metadata does not say.
///
/// - up to 1.16.x → 8
/// - 1.17.x → 16
/// - 1.18 to 1.20.4 → 17
/// - 1.20.5 and later → 21
///
/// Weekly snapshots (`24w14a`) are mapped by year.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.to_ascii_lowercase();
    if let Some(week_pos) = lower.find('w') {
        let year_hint = &lower[..week_pos];
        if year_hint.len() == 2 {
            if let Ok(snapshot_year) = year_hint.parse::<u32>() {
                return match snapshot_year {
                    24.. => 21,
                    21 => 16,
                    22 | 23 => 17,
                    _ => 8,
                };
            }
        }
    }

    let numeric = lower.split(['-', ' ']).next().unwrap_or(&lower);
    let mut parts = numeric.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(20);
    let patch = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
        21
    } else if minor >= 18 {
        17
    } else if minor == 17 {
        16
    } else {
        8
    }
}

/// A runtime satisfies a requirement when it is at least as new and on the
/// same long-term track (8 / 17 / 21); Java 8 era games break on 17.
pub fn is_java_compatible_major(installed_major: u32, required_major: u32) -> bool {
    installed_major >= required_major
        && runtime_track(installed_major) == runtime_track(required_major)
}

fn runtime_track(major: u32) -> u32 {
    if major <= 8 {
        8
    } else if major >= 21 {
        21
    } else {
        17
    }
}

// ─── Detection ───

pub fn detect_java_installations() -> Vec<JavaInstallation> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Ok(home) = std::env::var("JAVA_HOME") {
        candidates.push(locate_java_binary(Path::new(&home)));
    }

    for root in well_known_java_roots() {
        if let Ok(entries) = std::fs::read_dir(&root) {
            candidates.extend(
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .map(|path| locate_java_binary(&path)),
            );
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        candidates.extend(
            std::env::split_paths(&path_var)
                .map(|dir| dir.join(java_exe()))
                .filter(|path| path.is_file()),
        );
    }

    let mut detected: Vec<JavaInstallation> = candidates
        .iter()
        .filter(|path| path.is_file())
        .filter_map(|path| probe_java(path))
        .collect();

    detected.sort_by(|a, b| a.path.cmp(&b.path));
    detected.dedup_by(|a, b| a.path == b.path);
    detected
}

fn well_known_java_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            PathBuf::from(r"C:\Program Files\Java"),
            PathBuf::from(r"C:\Program Files\Eclipse Adoptium"),
            PathBuf::from(r"C:\Program Files\Microsoft"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Library/Java/JavaVirtualMachines")]
    } else {
        vec![PathBuf::from("/usr/lib/jvm"), PathBuf::from("/opt/java")]
    }
}

#[instrument]
pub fn probe_java(path: &Path) -> Option<JavaInstallation> {
    let output = Command::new(path).arg("-version").output().ok()?;
    let version_output = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    debug!(
        "Probing {:?}: {}",
        path,
        version_output.lines().next().unwrap_or("")
    );

    let version = parse_version_string(&version_output)?;
    let major = parse_major_version(&version);
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    Some(JavaInstallation {
        path: canonical,
        version,
        major,
    })
}

fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let end = line[start + 1..].find('"')?;
        Some(line[start + 1..start + 1 + end].to_string())
    })
}

fn parse_major_version(version: &str) -> u32 {
    let first_part = version.split(['.', '-', '+']).next().unwrap_or("0");
    let major: u32 = first_part.parse().unwrap_or(0);

    if major == 1 {
        version
            .split('.')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(major)
    } else {
        major
    }
}

pub fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }

    primary
}
