use dataprius_core::{DatapriusClient, DatapriusError};
use thiserror::Error;

use super::records::FolderId;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no remote folder matches path {0:?}")]
    NotFound(String),
    #[error("resolving remote path {path:?} failed: {source}")]
    Api {
        path: String,
        source: DatapriusError,
    },
}

#[derive(Clone)]
pub struct PathResolver {
    client: DatapriusClient,
}

impl PathResolver {
    pub fn new(client: DatapriusClient) -> Self {
        Self { client }
    }

    /// The first folder the backend reports for `path` wins.
    pub async fn resolve(&self, path: &str) -> Result<FolderId, ResolutionError> {
        let folders = self
            .client
            .get_folder_path(path)
            .await
            .map_err(|source| ResolutionError::Api {
                path: path.to_string(),
                source,
            })?;
        folders
            .into_iter()
            .next()
            .filter(|folder| !folder.id.trim().is_empty())
            .map(|folder| FolderId::new(folder.id))
            .ok_or_else(|| ResolutionError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver_with(server: &MockServer, response: ResponseTemplate) -> PathResolver {
        Mock::given(method("POST"))
            .and(path("/folders/getpath"))
            .and(body_json(json!({ "Path": "/Archive" })))
            .respond_with(response)
            .mount(server)
            .await;
        let client = DatapriusClient::with_base_url(&server.uri(), "test-token").unwrap();
        PathResolver::new(client)
    }

    #[tokio::test]
    async fn resolves_first_match() {
        let server = MockServer::start().await;
        let resolver = resolver_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "data": [ { "ID": 100, "Name": "Archive" }, { "ID": 200, "Name": "Archive" } ]
            })),
        )
        .await;

        let id = resolver.resolve("/Archive").await.unwrap();
        assert_eq!(id, FolderId::new("100"));
    }

    #[tokio::test]
    async fn empty_result_is_not_found() {
        let server = MockServer::start().await;
        let resolver = resolver_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "data": [] })),
        )
        .await;

        let err = resolver.resolve("/Archive").await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(ref p) if p == "/Archive"));
    }

    #[tokio::test]
    async fn blank_id_is_not_found() {
        let server = MockServer::start().await;
        let resolver = resolver_with(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "data": [ { "ID": "" } ] })),
        )
        .await;

        assert!(matches!(
            resolver.resolve("/Archive").await,
            Err(ResolutionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn api_failure_is_reported() {
        let server = MockServer::start().await;
        let resolver = resolver_with(&server, ResponseTemplate::new(403)).await;

        assert!(matches!(
            resolver.resolve("/Archive").await,
            Err(ResolutionError::Api { .. })
        ));
    }
}
