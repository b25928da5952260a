use std::fmt;
use std::future::Future;

use dataprius_core::{DatapriusClient, DatapriusError, ListPage};
use thiserror::Error;

use super::records::{FileRecord, FolderId, FolderRecord};

/// Upper bound on pages per listing; guards against a backend whose
/// reported page count never lets the loop finish.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Files,
    Subfolders,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListKind::Files => "files",
            ListKind::Subfolders => "subfolders",
        })
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("listing {kind} of folder {folder} failed on page {page}: {source}")]
    Api {
        folder: FolderId,
        kind: ListKind,
        page: u32,
        source: DatapriusError,
    },
    #[error("listing {kind} of folder {folder} did not finish within {limit} pages")]
    PageLimitExceeded {
        folder: FolderId,
        kind: ListKind,
        limit: u32,
    },
}

#[derive(Clone)]
pub struct PaginatedLister {
    client: DatapriusClient,
    max_pages: u32,
}

impl PaginatedLister {
    pub fn new(client: DatapriusClient, max_pages: u32) -> Self {
        Self {
            client,
            max_pages: max_pages.max(1),
        }
    }

    pub async fn list_files(&self, folder: &FolderId) -> Result<Vec<FileRecord>, ListError> {
        let entries = collect_pages(folder, ListKind::Files, self.max_pages, move |page| {
            self.client.list_files(folder.as_str(), page)
        })
        .await?;
        Ok(entries.into_iter().map(FileRecord::from).collect())
    }

    pub async fn list_subfolders(&self, folder: &FolderId) -> Result<Vec<FolderRecord>, ListError> {
        let entries = collect_pages(folder, ListKind::Subfolders, self.max_pages, move |page| {
            self.client.list_folders(folder.as_str(), page)
        })
        .await?;
        Ok(entries.into_iter().map(FolderRecord::from).collect())
    }
}

/// Requests pages 1, 2, ... until the next page number exceeds the reported
/// `total_pages`, concatenating items in the order they arrive.
pub async fn collect_pages<T, F, Fut>(
    folder: &FolderId,
    kind: ListKind,
    max_pages: u32,
    mut fetch_page: F,
) -> Result<Vec<T>, ListError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ListPage<T>, DatapriusError>>,
{
    let mut items = Vec::new();
    let mut page = 1u32;
    loop {
        if page > max_pages {
            return Err(ListError::PageLimitExceeded {
                folder: folder.clone(),
                kind,
                limit: max_pages,
            });
        }
        let response = fetch_page(page).await.map_err(|source| ListError::Api {
            folder: folder.clone(),
            kind,
            page,
            source,
        })?;
        items.extend(response.data);
        page = page.saturating_add(1);
        if page > response.meta.pagination.total_pages {
            break;
        }
    }
    Ok(items)
}
