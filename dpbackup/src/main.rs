use std::sync::Arc;

use dpbackup::backup::run_backup;
use dpbackup::config::BackupConfig;
use dpbackup::sync::events::TracingSink;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn print_usage() {
    println!("Usage: dpbackup [--help]");
    println!("Backs up a Dataprius folder tree into a local directory.");
    println!();
    println!("Environment (a .env file in the working directory is honoured):");
    println!("  DP_CLIENT_ID, DP_CLIENT_SECRET   API credentials (required)");
    println!("  DP_FOLDER_DIR                    remote folder to back up (default /TEST)");
    println!("  BACKUP_DIR                       local backup root (default ./dataprius_backup)");
    println!("  DP_API_BASE                      API base url");
    println!("  DP_DOWNLOAD_CONCURRENCY          parallel downloads per folder (default 4)");
    println!("  DP_MAX_PAGES                     page limit per listing (default 10000)");
    println!("  RUST_LOG                         log filter (default info)");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    if parse_cli_mode(std::env::args())? == CliMode::Help {
        print_usage();
        return Ok(());
    }
    init_tracing();

    let config = BackupConfig::from_env()?;
    match run_backup(&config, Arc::new(TracingSink)).await {
        Ok(report) if report.is_complete() => {
            info!(downloaded = report.files_downloaded, "backup finished successfully");
            Ok(())
        }
        Ok(report) => {
            warn!(
                failed_files = report.files_failed,
                failed_folders = report.folders_failed,
                "backup finished with errors"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "backup failed");
            Err(err.into())
        }
    }
}
