use std::path::Path;
use std::time::{Duration, SystemTime};

use time::OffsetDateTime;

/// Allowed skew between remote and local modification times.
pub const MTIME_TOLERANCE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileState {
    pub size: u64,
    pub modified: SystemTime,
}

impl LocalFileState {
    /// Stats `path`; `None` when nothing usable exists there.
    pub async fn read(path: &Path) -> Option<Self> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        Some(Self {
            size: meta.len(),
            modified: meta.modified().ok()?,
        })
    }

    pub fn matches(&self, remote_size: Option<u64>, remote_modified: SystemTime) -> bool {
        if remote_size.is_some_and(|size| size != self.size) {
            return false;
        }
        let skew = remote_modified
            .duration_since(self.modified)
            .unwrap_or_else(|err| err.duration());
        skew <= MTIME_TOLERANCE
    }
}

pub async fn is_up_to_date(
    local_path: &Path,
    remote_size: Option<u64>,
    remote_modified: OffsetDateTime,
) -> bool {
    match LocalFileState::read(local_path).await {
        Some(local) => local.matches(remote_size, remote_modified.into()),
        None => false,
    }
}

/// Used when the remote time is unknown: a local copy counts as current only
/// if the remote declares a size and the local file has exactly that size.
pub async fn has_expected_size(local_path: &Path, remote_size: Option<u64>) -> bool {
    let Some(expected) = remote_size else {
        return false;
    };
    LocalFileState::read(local_path)
        .await
        .is_some_and(|local| local.size == expected)
}
