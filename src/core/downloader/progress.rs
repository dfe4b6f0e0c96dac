use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloading,
    Verifying,
    Completed,
    Failed,
    /// Cancelled by the user; a later call resumes.
    Paused,
}

/// Snapshot emitted after each file of a version download.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub version_id: String,
    pub status: DownloadStatus,
    pub completed_files: usize,
    pub total_files: usize,
    pub completed_bytes: u64,
    pub total_bytes: u64,
    /// 0..=100, never decreasing within one download.
    pub percentage: f64,
    pub bytes_per_second: f64,
    pub eta_seconds: Option<u64>,
    pub current_file: Option<String>,
}

pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;

/// Accumulates per-file completions into [`DownloadProgress`] snapshots.
pub struct ProgressTracker {
    version_id: String,
    total_files: usize,
    total_bytes: u64,
    completed_files: usize,
    completed_bytes: u64,
    /// Bytes that actually crossed the network; skipped files do not count
    /// towards throughput.
    transferred_bytes: u64,
    started: Instant,
    last_percentage: f64,
}

impl ProgressTracker {
    pub fn new(version_id: &str, total_files: usize, total_bytes: u64) -> Self {
        Self {
            version_id: version_id.to_string(),
            total_files,
            total_bytes,
            completed_files: 0,
            completed_bytes: 0,
            transferred_bytes: 0,
            started: Instant::now(),
            last_percentage: 0.0,
        }
    }

    pub fn file_done(&mut self, size: u64, transferred: u64) {
        self.completed_files = (self.completed_files + 1).min(self.total_files);
        self.completed_bytes = (self.completed_bytes + size).min(self.total_bytes);
        self.transferred_bytes += transferred;
    }

    pub fn snapshot(&mut self, status: DownloadStatus, current_file: Option<String>) -> DownloadProgress {
        let raw = if status == DownloadStatus::Completed {
            100.0
        } else if self.total_bytes > 0 {
            self.completed_bytes as f64 / self.total_bytes as f64 * 100.0
        } else if self.total_files > 0 {
            self.completed_files as f64 / self.total_files as f64 * 100.0
        } else {
            0.0
        };
        let percentage = raw.clamp(0.0, 100.0).max(self.last_percentage);
        self.last_percentage = percentage;

        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            self.transferred_bytes as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total_bytes.saturating_sub(self.completed_bytes);
        let eta_seconds = if bytes_per_second > 0.0 && status == DownloadStatus::Downloading {
            Some((remaining as f64 / bytes_per_second).ceil() as u64)
        } else {
            None
        };

        DownloadProgress {
            version_id: self.version_id.clone(),
            status,
            completed_files: self.completed_files,
            total_files: self.total_files,
            completed_bytes: self.completed_bytes,
            total_bytes: self.total_bytes,
            percentage,
            bytes_per_second,
            eta_seconds,
            current_file,
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_never_decreases() {
        let mut tracker = ProgressTracker::new("1.20.1", 3, 300);
        tracker.file_done(100, 100);
        let first = tracker.snapshot(DownloadStatus::Downloading, None);
        assert!((first.percentage - 33.333).abs() < 0.01);

        // A failure snapshot must not report less than what was already shown.
        let failed = tracker.snapshot(DownloadStatus::Failed, None);
        assert!(failed.percentage >= first.percentage);

        tracker.file_done(100, 0);
        tracker.file_done(100, 0);
        let done = tracker.snapshot(DownloadStatus::Completed, None);
        assert_eq!(done.percentage, 100.0);
        assert_eq!(done.completed_files, 3);
        assert_eq!(done.eta_seconds, None);
    }

    #[test]
    fn empty_download_reports_zero_then_complete() {
        let mut tracker = ProgressTracker::new("x", 0, 0);
        assert_eq!(tracker.snapshot(DownloadStatus::Downloading, None).percentage, 0.0);
        assert_eq!(tracker.snapshot(DownloadStatus::Completed, None).percentage, 100.0);
    }

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
