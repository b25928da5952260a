use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use super::records::FolderId;
use super::walker::SyncReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    FolderStarted {
        folder: FolderId,
        local_dir: PathBuf,
    },
    FilesListed {
        folder: FolderId,
        count: usize,
    },
    SubfoldersListed {
        folder: FolderId,
        count: usize,
    },
    FileUpToDate {
        path: PathBuf,
    },
    FileDownloaded {
        path: PathBuf,
        bytes: u64,
    },
    TimestampNotApplied {
        path: PathBuf,
        reason: String,
    },
    FileFailed {
        folder: FolderId,
        name: String,
        error: String,
    },
    FolderFailed {
        folder: FolderId,
        local_dir: PathBuf,
        error: String,
    },
    FolderRevisited {
        folder: FolderId,
        local_dir: PathBuf,
    },
    Finished {
        report: SyncReport,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Forwards engine events to the `tracing` subscriber installed by the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::FolderStarted { folder, local_dir } => {
                info!(%folder, local_dir = %local_dir.display(), "listing folder");
            }
            SyncEvent::FilesListed { folder, count } => {
                info!(%folder, count, "found files in folder");
            }
            SyncEvent::SubfoldersListed { folder, count } => {
                debug!(%folder, count, "found subfolders");
            }
            SyncEvent::FileUpToDate { path } => {
                debug!(path = %path.display(), "up to date");
            }
            SyncEvent::FileDownloaded { path, bytes } => {
                info!(path = %path.display(), bytes, "downloaded");
            }
            SyncEvent::TimestampNotApplied { path, reason } => {
                warn!(path = %path.display(), %reason, "could not apply remote modification time");
            }
            SyncEvent::FileFailed {
                folder,
                name,
                error,
            } => {
                warn!(%folder, %name, %error, "error downloading file");
            }
            SyncEvent::FolderFailed {
                folder,
                local_dir,
                error,
            } => {
                error!(%folder, local_dir = %local_dir.display(), %error, "folder skipped");
            }
            SyncEvent::FolderRevisited { folder, local_dir } => {
                warn!(%folder, local_dir = %local_dir.display(), "folder already visited, not descending again");
            }
            SyncEvent::Finished { report } => {
                info!(
                    folders = report.folders_visited,
                    folders_failed = report.folders_failed,
                    downloaded = report.files_downloaded,
                    up_to_date = report.files_up_to_date,
                    failed = report.files_failed,
                    bytes = report.bytes_downloaded,
                    "sync pass complete"
                );
            }
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
