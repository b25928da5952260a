use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::sync::walker::SyncOptions;

const DEFAULT_API_BASE: &str = "https://api.v2.dataprius.com";
const DEFAULT_SOURCE_PATH: &str = "/TEST";
const DEFAULT_BACKUP_DIR_NAME: &str = "dataprius_backup";

#[derive(Clone)]
pub struct BackupConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub source_path: String,
    pub backup_dir: PathBuf,
    pub download_concurrency: usize,
    pub max_pages: u32,
}

impl BackupConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let client_id = non_empty("DP_CLIENT_ID").context("DP_CLIENT_ID is not set")?;
        let client_secret = non_empty("DP_CLIENT_SECRET").context("DP_CLIENT_SECRET is not set")?;
        let api_base = non_empty("DP_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let source_path =
            non_empty("DP_FOLDER_DIR").unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string());
        let backup_dir = non_empty("BACKUP_DIR")
            .map(|value| match dirs::home_dir() {
                Some(home) => expand_with_home(&value, &home),
                None => PathBuf::from(value),
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR_NAME));
        let defaults = SyncOptions::default();
        let download_concurrency = read_u64(
            lookup("DP_DOWNLOAD_CONCURRENCY"),
            defaults.download_concurrency as u64,
        );
        let max_pages = read_u64(lookup("DP_MAX_PAGES"), u64::from(defaults.max_pages));

        Ok(Self {
            client_id,
            client_secret,
            api_base,
            source_path,
            backup_dir,
            download_concurrency: usize::try_from(download_concurrency).unwrap_or(usize::MAX),
            max_pages: u32::try_from(max_pages).unwrap_or(u32::MAX),
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            download_concurrency: self.download_concurrency,
            max_pages: self.max_pages,
        }
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("source_path", &self.source_path)
            .field("backup_dir", &self.backup_dir)
            .field("download_concurrency", &self.download_concurrency)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
