use dataprius_core::{OAuthClient, OAuthError, OAuthToken};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to get access token: {0}")]
    OAuth(#[from] OAuthError),
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<i64>,
}

impl CachedToken {
    fn from_oauth_token(token: &OAuthToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now_unix().saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))),
        }
    }
}

pub struct TokenProvider {
    oauth_client: OAuthClient,
    cached: Option<CachedToken>,
    refresh_skew_secs: i64,
}

impl TokenProvider {
    pub fn new(oauth_client: OAuthClient) -> Self {
        Self {
            oauth_client,
            cached: None,
            refresh_skew_secs: 60,
        }
    }

    pub fn with_credentials(
        api_base: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, AuthError> {
        let oauth_client = OAuthClient::with_base_url(api_base, client_id, client_secret)?;
        Ok(Self::new(oauth_client))
    }

    /// Returns the cached bearer token, exchanging credentials again when
    /// there is none yet or it is about to expire.
    pub async fn valid_access_token(&mut self) -> Result<String, AuthError> {
        if let Some(cached) = &self.cached {
            if !expires_soon(cached, self.refresh_skew_secs) {
                return Ok(cached.access_token.clone());
            }
        }
        let token = self.oauth_client.client_credentials_token().await?;
        let cached = CachedToken::from_oauth_token(&token);
        let access_token = cached.access_token.clone();
        self.cached = Some(cached);
        Ok(access_token)
    }
}

fn expires_soon(token: &CachedToken, skew_secs: i64) -> bool {
    let Some(expires_at) = token.expires_at else {
        return false;
    };
    expires_at <= now_unix().saturating_add(skew_secs)
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
