use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use dpbackup::backup::{BackupError, run_backup};
use dpbackup::config::BackupConfig;
use dpbackup::sync::events::{MemorySink, SyncEvent};
use dpbackup::sync::resolver::ResolutionError;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORT_MTIME: u64 = 1_704_067_200; // 2024-01-01T00:00:00Z
const NOTES_MTIME: u64 = 1_717_200_000; // 2024-06-01T00:00:00Z

fn backup_config(server: &MockServer, backup_dir: &Path) -> BackupConfig {
    let vars = [
        ("DP_CLIENT_ID", "client-id".to_string()),
        ("DP_CLIENT_SECRET", "secret".to_string()),
        ("DP_FOLDER_DIR", "/Archive".to_string()),
        ("DP_API_BASE", server.uri()),
        ("BACKUP_DIR", backup_dir.display().to_string()),
    ];
    BackupConfig::from_lookup(|name| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.clone())
    })
    .unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "bearer-1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, endpoint: String, data: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .and(header("authorization", "Bearer bearer-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": data,
            "meta": { "pagination": { "current_page": 1, "total_pages": 1 } }
        })))
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer) {
    mount_token(server).await;
    Mock::given(method("POST"))
        .and(path("/folders/getpath"))
        .and(body_json(json!({ "Path": "/Archive" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "ID": 100, "Name": "Archive" } ]
        })))
        .mount(server)
        .await;
    mount_listing(
        server,
        "/folders/files/100".into(),
        json!([ { "ID": 1, "Name": "report.pdf", "Size": 1000, "Modified": "2024-01-01T00:00:00Z" } ]),
    )
    .await;
    mount_listing(
        server,
        "/folders/list/100".into(),
        json!([ { "ID": 200, "Name": "2024" } ]),
    )
    .await;
    mount_listing(
        server,
        "/folders/files/200".into(),
        json!([ { "ID": 2, "Name": "notes.txt", "Size": 50, "Modified": "2024-06-01T00:00:00Z" } ]),
    )
    .await;
    mount_listing(server, "/folders/list/200".into(), json!([])).await;

    // Each body is served once; a second run must not download again.
    Mock::given(method("GET"))
        .and(path("/files/download/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1000]))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/download/2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'n'; 50]))
        .expect(1)
        .mount(server)
        .await;
}

fn assert_file(path: &Path, size: u64, unix_mtime: u64) {
    let meta = std::fs::metadata(path).unwrap();
    assert_eq!(meta.len(), size, "size of {}", path.display());
    let expected = UNIX_EPOCH + Duration::from_secs(unix_mtime);
    let actual = meta.modified().unwrap();
    let skew = actual
        .duration_since(expected)
        .unwrap_or_else(|err| err.duration());
    assert!(skew <= Duration::from_secs(2), "mtime of {}", path.display());
}

#[tokio::test]
async fn archive_scenario_mirrors_tree_and_is_idempotent() {
    let server = MockServer::start().await;
    mount_archive(&server).await;
    let dir = tempdir().unwrap();
    let config = backup_config(&server, dir.path());

    let first = run_backup(&config, Arc::new(MemorySink::new())).await.unwrap();
    assert_eq!(first.files_downloaded, 2);
    assert_eq!(first.folders_visited, 2);
    assert!(first.is_complete());

    assert_file(&dir.path().join("Archive/report.pdf"), 1000, REPORT_MTIME);
    assert_file(&dir.path().join("Archive/2024/notes.txt"), 50, NOTES_MTIME);

    let sink = Arc::new(MemorySink::new());
    let second = run_backup(&config, sink.clone()).await.unwrap();
    assert_eq!(second.files_downloaded, 0);
    assert_eq!(second.files_up_to_date, 2);
    assert!(
        !sink
            .events()
            .iter()
            .any(|event| matches!(event, SyncEvent::FileDownloaded { .. }))
    );
}

#[tokio::test]
async fn rejected_credentials_fail_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();

    let err = run_backup(&backup_config(&server, dir.path()), Arc::new(MemorySink::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::Auth(_)));
    assert!(!dir.path().join("Archive").exists());
}

#[tokio::test]
async fn unknown_source_path_fails_the_run() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/folders/getpath"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();

    let err = run_backup(&backup_config(&server, dir.path()), Arc::new(MemorySink::new()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BackupError::Resolution(ResolutionError::NotFound(_))
    ));
}
