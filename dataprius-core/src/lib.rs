mod client;
mod oauth;

pub use client::{
    DatapriusClient, DatapriusError, FileEntry, FolderEntry, ListPage, PageMeta, Pagination,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
pub use reqwest::StatusCode;
