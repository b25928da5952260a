use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dataprius_core::DatapriusClient;
use futures_util::StreamExt;
use futures_util::stream;
use thiserror::Error;
use tokio::sync::Mutex;

use super::events::{EventSink, SyncEvent};
use super::fetcher::{FetchError, FetchOutcome, FileFetcher};
use super::lister::{DEFAULT_MAX_PAGES, ListError, PaginatedLister};
use super::paths::{local_child, normalize_name};
use super::records::{FileRecord, FolderId};
use crate::token_provider::{AuthError, TokenProvider};

const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub download_concurrency: usize,
    pub max_pages: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub folders_visited: usize,
    pub folders_failed: usize,
    pub folders_revisited: usize,
    pub files_downloaded: usize,
    pub files_up_to_date: usize,
    pub files_failed: usize,
    pub timestamps_not_applied: usize,
    pub bytes_downloaded: u64,
}

impl SyncReport {
    /// True when every folder and file was handled without error.
    pub fn is_complete(&self) -> bool {
        self.folders_failed == 0 && self.files_failed == 0
    }
}

#[derive(Debug, Error)]
enum NodeError {
    #[error("failed to create local directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    List(#[from] ListError),
}

pub struct SyncEngine {
    client: DatapriusClient,
    lister: PaginatedLister,
    fetcher: FileFetcher,
    sink: Arc<dyn EventSink>,
    download_concurrency: usize,
    tokens: Option<Mutex<TokenProvider>>,
}

impl SyncEngine {
    pub fn new(client: DatapriusClient, options: SyncOptions, sink: Arc<dyn EventSink>) -> Self {
        Self {
            lister: PaginatedLister::new(client.clone(), options.max_pages),
            fetcher: FileFetcher::new(client.clone()),
            client,
            sink,
            download_concurrency: options.download_concurrency.max(1),
            tokens: None,
        }
    }

    /// Checks the token before every folder and swaps in a fresh one when
    /// the current token is close to expiry.
    pub fn with_token_provider(mut self, provider: TokenProvider) -> Self {
        self.tokens = Some(Mutex::new(provider));
        self
    }

    /// Mirrors the remote subtree under `root` into `root_dir`, depth first,
    /// files before subfolders. Failures are reported through the sink and
    /// counted in the report; they never abort sibling folders.
    pub async fn sync(&self, root: FolderId, root_dir: PathBuf) -> SyncReport {
        let mut report = SyncReport::default();
        let mut visited = HashSet::new();
        let mut pending = vec![(root, root_dir)];

        while let Some((folder, local_dir)) = pending.pop() {
            if !visited.insert(folder.clone()) {
                report.folders_revisited += 1;
                self.sink
                    .emit(SyncEvent::FolderRevisited { folder, local_dir });
                continue;
            }
            report.folders_visited += 1;
            self.sink.emit(SyncEvent::FolderStarted {
                folder: folder.clone(),
                local_dir: local_dir.clone(),
            });

            match self.sync_folder(&folder, &local_dir, &mut report).await {
                // Reversed so the first listed subfolder is popped next.
                Ok(children) => pending.extend(children.into_iter().rev()),
                Err(err) => {
                    report.folders_failed += 1;
                    self.sink.emit(SyncEvent::FolderFailed {
                        folder,
                        local_dir,
                        error: err.to_string(),
                    });
                }
            }
        }

        self.sink.emit(SyncEvent::Finished {
            report: report.clone(),
        });
        report
    }

    async fn sync_folder(
        &self,
        folder: &FolderId,
        local_dir: &Path,
        report: &mut SyncReport,
    ) -> Result<Vec<(FolderId, PathBuf)>, NodeError> {
        self.refresh_token().await?;
        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|source| NodeError::CreateDir {
                path: local_dir.to_path_buf(),
                source,
            })?;

        let files = self.lister.list_files(folder).await?;
        self.sink.emit(SyncEvent::FilesListed {
            folder: folder.clone(),
            count: files.len(),
        });
        self.fetch_files(folder, local_dir, files, report).await;

        let subfolders = self.lister.list_subfolders(folder).await?;
        self.sink.emit(SyncEvent::SubfoldersListed {
            folder: folder.clone(),
            count: subfolders.len(),
        });

        let mut children = Vec::with_capacity(subfolders.len());
        for subfolder in subfolders {
            match local_child(local_dir, &subfolder.name) {
                Ok(path) => children.push((subfolder.id, path)),
                Err(err) => {
                    report.folders_failed += 1;
                    self.sink.emit(SyncEvent::FolderFailed {
                        folder: subfolder.id,
                        local_dir: local_dir.to_path_buf(),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(children)
    }

    async fn refresh_token(&self) -> Result<(), AuthError> {
        let Some(tokens) = &self.tokens else {
            return Ok(());
        };
        let token = tokens.lock().await.valid_access_token().await?;
        self.client.set_token(token);
        Ok(())
    }

    async fn fetch_files(
        &self,
        folder: &FolderId,
        local_dir: &Path,
        files: Vec<FileRecord>,
        report: &mut SyncReport,
    ) {
        let mut downloads = stream::iter(group_by_local_name(files))
            .map(|group| self.fetch_group(local_dir, group))
            .buffer_unordered(self.download_concurrency);

        while let Some(results) = downloads.next().await {
            for (record, result) in results {
                self.record_fetch(folder, record, result, report);
            }
        }
    }

    // Records in one group share a local path, so they run one after another.
    async fn fetch_group(
        &self,
        local_dir: &Path,
        group: Vec<FileRecord>,
    ) -> Vec<(FileRecord, Result<FetchOutcome, FetchError>)> {
        let mut results = Vec::with_capacity(group.len());
        for record in group {
            let result = self.fetcher.fetch(&record, local_dir).await;
            results.push((record, result));
        }
        results
    }

    fn record_fetch(
        &self,
        folder: &FolderId,
        record: FileRecord,
        result: Result<FetchOutcome, FetchError>,
        report: &mut SyncReport,
    ) {
        match result {
            Ok(FetchOutcome::UpToDate { path }) => {
                report.files_up_to_date += 1;
                self.sink.emit(SyncEvent::FileUpToDate { path });
            }
            Ok(FetchOutcome::Downloaded { path, bytes }) => {
                report.files_downloaded += 1;
                report.bytes_downloaded += bytes;
                self.sink.emit(SyncEvent::FileDownloaded { path, bytes });
            }
            Ok(FetchOutcome::DownloadedWithoutTimestamp {
                path,
                bytes,
                reason,
            }) => {
                report.files_downloaded += 1;
                report.timestamps_not_applied += 1;
                report.bytes_downloaded += bytes;
                self.sink.emit(SyncEvent::FileDownloaded {
                    path: path.clone(),
                    bytes,
                });
                self.sink
                    .emit(SyncEvent::TimestampNotApplied { path, reason });
            }
            Err(err) => {
                report.files_failed += 1;
                self.sink.emit(SyncEvent::FileFailed {
                    folder: folder.clone(),
                    name: record.name,
                    error: err.to_string(),
                });
            }
        }
    }
}

/// Buckets records by their NFC name, keeping first-seen order both across
/// and within buckets.
fn group_by_local_name(files: Vec<FileRecord>) -> Vec<Vec<FileRecord>> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<FileRecord>> = Vec::new();
    for record in files {
        let key = normalize_name(&record.name);
        match slots.get(&key) {
            Some(&slot) => groups[slot].push(record),
            None => {
                slots.insert(key, groups.len());
                groups.push(vec![record]);
            }
        }
    }
    groups
}
