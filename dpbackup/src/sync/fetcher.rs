use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dataprius_core::{DatapriusClient, DatapriusError};
use filetime::FileTime;
use thiserror::Error;
use time::OffsetDateTime;

use super::freshness::{has_expected_size, is_up_to_date};
use super::paths::{PathError, local_child};
use super::records::FileRecord;

const STAGING_PREFIX: &str = ".dpbackup-";
const STAGING_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("api error: {0}")]
    Api(#[from] DatapriusError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("path error: {0}")]
    Path(#[from] PathError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    UpToDate {
        path: PathBuf,
    },
    Downloaded {
        path: PathBuf,
        bytes: u64,
    },
    /// Content is on disk but the remote modification time could not be applied.
    DownloadedWithoutTimestamp {
        path: PathBuf,
        bytes: u64,
        reason: String,
    },
}

#[derive(Clone)]
pub struct FileFetcher {
    client: DatapriusClient,
}

impl FileFetcher {
    pub fn new(client: DatapriusClient) -> Self {
        Self { client }
    }

    /// Brings one remote file up to date inside `local_dir`. A missing or
    /// unreadable remote time does not stop the download; the file is then
    /// judged by size alone and reported without a timestamp.
    pub async fn fetch(
        &self,
        record: &FileRecord,
        local_dir: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        let target = local_child(local_dir, &record.name)?;
        let modified = record.modified_at();
        let fresh = match &modified {
            Ok(modified) => is_up_to_date(&target, record.size, *modified).await,
            Err(_) => has_expected_size(&target, record.size).await,
        };
        if fresh {
            return Ok(FetchOutcome::UpToDate { path: target });
        }

        let body = self.client.download_file(&record.id).await?;
        let bytes = body.len() as u64;
        write_replacing(&target, body).await?;
        Ok(match modified {
            Ok(modified) => finish_download(target, bytes, modified).await,
            Err(err) => FetchOutcome::DownloadedWithoutTimestamp {
                path: target,
                bytes,
                reason: err.to_string(),
            },
        })
    }
}

/// Stamps the remote time onto a freshly written file; a failure here
/// downgrades the outcome instead of failing the download.
pub async fn finish_download(path: PathBuf, bytes: u64, modified: OffsetDateTime) -> FetchOutcome {
    match apply_modified_time(&path, modified).await {
        Ok(()) => FetchOutcome::Downloaded { path, bytes },
        Err(err) => FetchOutcome::DownloadedWithoutTimestamp {
            path,
            bytes,
            reason: err.to_string(),
        },
    }
}

pub async fn apply_modified_time(path: &Path, modified: OffsetDateTime) -> io::Result<()> {
    let path = path.to_path_buf();
    let stamp = FileTime::from_system_time(modified.into());
    tokio::task::spawn_blocking(move || filetime::set_file_times(&path, stamp, stamp))
        .await
        .map_err(io::Error::other)?
}

// The staging file gets a fresh unique name and is created exclusively, so it
// can never truncate a sibling, whatever the remote names are.
async fn write_replacing(target: &Path, body: Vec<u8>) -> io::Result<()> {
    let parent = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&parent).await?;
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&parent)?;
        staged.write_all(&body)?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}
