use std::sync::Arc;

use dataprius_core::{DatapriusClient, DatapriusError};
use thiserror::Error;
use tracing::info;

use crate::config::BackupConfig;
use crate::sync::events::EventSink;
use crate::sync::paths::{PathError, destination_for};
use crate::sync::resolver::{PathResolver, ResolutionError};
use crate::sync::walker::{SyncEngine, SyncReport};
use crate::token_provider::{AuthError, TokenProvider};

/// Failures that stop a run before the tree walk starts.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to build api client: {0}")]
    Client(#[from] DatapriusError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("invalid destination for remote path: {0}")]
    Destination(#[from] PathError),
}

/// One full backup pass: token, root resolution, then the tree walk.
/// Per-file and per-folder failures end up in the returned report.
pub async fn run_backup(
    config: &BackupConfig,
    sink: Arc<dyn EventSink>,
) -> Result<SyncReport, BackupError> {
    info!("getting access token");
    let mut tokens =
        TokenProvider::with_credentials(&config.api_base, &config.client_id, &config.client_secret)?;
    let token = tokens.valid_access_token().await?;
    let client = DatapriusClient::with_base_url(&config.api_base, token)?;

    info!(path = %config.source_path, "resolving folder id");
    let root = PathResolver::new(client.clone())
        .resolve(&config.source_path)
        .await?;

    let destination = destination_for(&config.backup_dir, &config.source_path)?;
    info!(%root, destination = %destination.display(), "starting backup");

    let engine =
        SyncEngine::new(client, config.sync_options(), sink).with_token_provider(tokens);
    Ok(engine.sync(root, destination).await)
}
