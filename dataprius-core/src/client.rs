use std::sync::{Arc, RwLock};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.v2.dataprius.com";

#[derive(Debug, Error)]
pub enum DatapriusError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry path segments: {0}")]
    BaseUrl(String),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct DatapriusClient {
    http: Client,
    base_url: Url,
    token: Arc<RwLock<String>>,
}

impl DatapriusClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DatapriusError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DatapriusError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DatapriusError::BaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: Arc::new(RwLock::new(token.into())),
        })
    }

    /// Replaces the bearer token for this client and every clone of it.
    pub fn set_token(&self, token: impl Into<String>) {
        let mut current = self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = token.into();
    }

    /// Looks up the folders matching a human-readable path such as `/Archive/2024`.
    pub async fn get_folder_path(&self, path: &str) -> Result<Vec<FolderEntry>, DatapriusError> {
        let url = self.endpoint("/folders/getpath")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&PathRequest { path })
            .send()
            .await?;
        let payload: DataResponse<FolderEntry> = Self::handle_response(response).await?;
        Ok(payload.data)
    }

    pub async fn list_folders(
        &self,
        folder_id: &str,
        page: u32,
    ) -> Result<ListPage<FolderEntry>, DatapriusError> {
        let url = self.endpoint_with_id("/folders/list", folder_id)?;
        self.post_page(url, page).await
    }

    pub async fn list_files(
        &self,
        folder_id: &str,
        page: u32,
    ) -> Result<ListPage<FileEntry>, DatapriusError> {
        let url = self.endpoint_with_id("/folders/files", folder_id)?;
        self.post_page(url, page).await
    }

    /// Downloads the whole body of a file in one payload.
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DatapriusError> {
        let url = self.endpoint_with_id("/files/download", file_id)?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DatapriusError::Api { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn post_page<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        page: u32,
    ) -> Result<ListPage<T>, DatapriusError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&PageRequest {
                page: page.to_string(),
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        let token = self.token.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        format!("Bearer {}", *token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DatapriusError> {
        Ok(self.base_url.join(path)?)
    }

    fn endpoint_with_id(&self, path: &str, id: &str) -> Result<Url, DatapriusError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| DatapriusError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DatapriusError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DatapriusError::Api { status, body })
        }
    }
}

#[derive(Debug, Serialize)]
struct PathRequest<'a> {
    #[serde(rename = "Path")]
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct PageRequest {
    #[serde(rename = "Page")]
    page: String,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FolderEntry {
    #[serde(rename = "ID", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileEntry {
    #[serde(rename = "ID", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Size", default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    #[serde(rename = "Modified", default)]
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
pub struct PageMeta {
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(deserialize_with = "u32_from_string_or_number")]
    pub total_pages: u32,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub current_page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub per_page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Number(u64),
}

// Identifiers come back as JSON numbers on some endpoints and strings on others.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawValue::deserialize(deserializer)? {
        RawValue::Text(value) => value,
        RawValue::Number(value) => value.to_string(),
    })
}

fn u32_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match RawValue::deserialize(deserializer)? {
        RawValue::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
        RawValue::Number(value) => u32::try_from(value).map_err(serde::de::Error::custom),
    }
}

// Sizes and counters: anything unreadable is dropped instead of failing the page.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Known(RawValue),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Known(RawValue::Number(value)) => Some(value),
        Lenient::Known(RawValue::Text(value)) => value.trim().parse().ok(),
        Lenient::Other(_) => None,
    })
}
