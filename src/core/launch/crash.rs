// ─── Crash Diagnosis ───
// Maps the captured output tail of a failed game process onto known
// failure signatures.

use std::collections::VecDeque;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashCause {
    NativeLibraryPath,
    InsufficientMemory,
    JavaVersionMismatch,
    MissingLibrary,
    CorruptedLibrary,
    ModConflict,
    LoaderEarlyDisplay,
    Unknown,
}

impl CrashCause {
    fn signatures(self) -> &'static [&'static str] {
        match self {
            CrashCause::NativeLibraryPath => &[
                "UnsatisfiedLinkError",
                "no lwjgl in java.library.path",
                "Failed to locate library",
            ],
            CrashCause::InsufficientMemory => &[
                "OutOfMemoryError",
                "Could not reserve enough space",
                "Java heap space",
            ],
            CrashCause::JavaVersionMismatch => &[
                "UnsupportedClassVersionError",
                "has been compiled by a more recent version of the Java Runtime",
            ],
            CrashCause::MissingLibrary => &["ClassNotFoundException", "NoClassDefFoundError"],
            CrashCause::CorruptedLibrary => &[
                "zip END header not found",
                "ZipException",
                "invalid LOC header",
            ],
            CrashCause::ModConflict => &[
                "MixinApplyError",
                "Mixin apply failed",
                "InvalidMixinException",
                "DuplicateModsFoundException",
            ],
            CrashCause::LoaderEarlyDisplay => {
                &["rendererFuture", "DisplayWindow.takeOverGlfwWindow"]
            }
            CrashCause::Unknown => &[],
        }
    }

    fn remediation(self) -> &'static str {
        match self {
            CrashCause::NativeLibraryPath => {
                "Clear the natives directory of this version and launch again to re-extract native libraries"
            }
            CrashCause::InsufficientMemory => {
                "Raise the maximum memory of the profile or close other applications"
            }
            CrashCause::JavaVersionMismatch => {
                "Select a Java runtime matching the version required by this game version"
            }
            CrashCause::MissingLibrary => {
                "Validate the installation and download the version again to restore missing libraries"
            }
            CrashCause::CorruptedLibrary => {
                "Delete the corrupted library named in the log and launch again to download a clean copy"
            }
            CrashCause::ModConflict => {
                "Remove or update the mods named in the mixin error; they conflict with each other or the loader"
            }
            CrashCause::LoaderEarlyDisplay => {
                "Update the mod loader, disable GPU overlays, and use a clean 64-bit Java runtime"
            }
            CrashCause::Unknown => "Check the game log for the first error and report it with the log attached",
        }
    }
}

const ORDERED_CAUSES: [CrashCause; 7] = [
    CrashCause::NativeLibraryPath,
    CrashCause::InsufficientMemory,
    CrashCause::JavaVersionMismatch,
    CrashCause::MissingLibrary,
    CrashCause::CorruptedLibrary,
    CrashCause::ModConflict,
    CrashCause::LoaderEarlyDisplay,
];

/// Diagnosis of a process that exited with a non-zero code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReport {
    pub pid: u32,
    pub profile_id: String,
    pub exit_code: Option<i32>,
    pub stderr_tail: Vec<String>,
    pub causes: Vec<CrashCause>,
    pub remediation: Vec<String>,
}

impl CrashReport {
    /// Classify a crash from the retained output tails. `Unknown` is only
    /// reported when nothing else matched.
    pub fn analyze(
        pid: u32,
        profile_id: &str,
        exit_code: Option<i32>,
        stderr_tail: Vec<String>,
        stdout_tail: &[String],
    ) -> Self {
        let lines = || stderr_tail.iter().chain(stdout_tail.iter());

        let mut causes: Vec<CrashCause> = ORDERED_CAUSES
            .into_iter()
            .filter(|cause| {
                lines().any(|line| cause.signatures().iter().any(|sig| line.contains(sig)))
            })
            .collect();
        if causes.is_empty() {
            causes.push(CrashCause::Unknown);
        }

        let remediation = causes
            .iter()
            .map(|cause| cause.remediation().to_string())
            .collect();

        Self {
            pid,
            profile_id: profile_id.to_string(),
            exit_code,
            stderr_tail,
            causes,
            remediation,
        }
    }
}

/// Last `capacity` lines of a stream.
#[derive(Debug)]
pub struct LineTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unsatisfied_link_error_suggests_clearing_natives() {
        let report = CrashReport::analyze(
            42,
            "p1",
            Some(1),
            lines(&[
                "Exception in thread \"main\" java.lang.UnsatisfiedLinkError: no lwjgl64 in java.library.path",
                "\tat java.lang.ClassLoader.loadLibrary(ClassLoader.java:1867)",
            ]),
            &[],
        );
        assert_eq!(report.causes, vec![CrashCause::NativeLibraryPath]);
        assert!(report.remediation[0].contains("Clear the natives directory"));
        assert_eq!(report.stderr_tail.len(), 2);
    }

    #[test]
    fn multiple_signatures_are_all_reported() {
        let report = CrashReport::analyze(
            1,
            "p",
            Some(-1),
            lines(&["java.lang.OutOfMemoryError: Java heap space"]),
            &lines(&["[main/ERROR]: java.util.zip.ZipException: zip END header not found"]),
        );
        assert_eq!(
            report.causes,
            vec![CrashCause::InsufficientMemory, CrashCause::CorruptedLibrary]
        );
        assert_eq!(report.remediation.len(), 2);
    }

    #[test]
    fn unmatched_output_is_unknown() {
        let report = CrashReport::analyze(1, "p", Some(3), lines(&["something odd"]), &[]);
        assert_eq!(report.causes, vec![CrashCause::Unknown]);
        assert_eq!(report.remediation.len(), 1);
    }

    #[test]
    fn tail_keeps_the_most_recent_lines() {
        let mut tail = LineTail::new(2);
        for line in ["a", "b", "c"] {
            tail.push(line.to_string());
        }
        assert_eq!(tail.into_lines(), lines(&["b", "c"]));
    }
}
