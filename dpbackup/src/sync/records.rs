use std::fmt;

use dataprius_core::{FileEntry, FolderEntry};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("remote file has no modification time")]
    Missing,
    #[error("unrecognized modification time {0:?}")]
    Invalid(String),
}

/// Opaque backend reference to a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: FolderId,
    pub name: String,
}

impl From<FolderEntry> for FolderRecord {
    fn from(entry: FolderEntry) -> Self {
        Self {
            id: FolderId::new(entry.id),
            name: entry.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

impl FileRecord {
    pub fn modified_at(&self) -> Result<OffsetDateTime, TimestampError> {
        let value = self.modified.as_deref().ok_or(TimestampError::Missing)?;
        parse_modified(value)
    }
}

impl From<FileEntry> for FileRecord {
    fn from(entry: FileEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            size: entry.size,
            modified: entry.modified,
        }
    }
}

/// Accepts RFC 3339 and the zone-less `YYYY-MM-DD HH:MM:SS` form, which is read as UTC.
pub fn parse_modified(value: &str) -> Result<OffsetDateTime, TimestampError> {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed);
    }
    let naive = value.replacen('T', " ", 1);
    PrimitiveDateTime::parse(
        &naive,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            &naive,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
    })
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|_| TimestampError::Invalid(value.to_string()))
}
