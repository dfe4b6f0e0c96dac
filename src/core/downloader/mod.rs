pub mod client;
pub mod engine;
pub mod progress;
pub mod source;

pub use client::{DownloadEntry, Downloader, FileOutcome};
pub use engine::DownloadEngine;
pub use progress::{DownloadProgress, DownloadStatus, ProgressSender};
pub use source::{HttpSource, RemoteBody, RemoteSource};
