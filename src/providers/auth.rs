//! Credentials for Google Cloud REST calls.
//!
//! Resolution order: API key, then a pre-minted OAuth access token, then the
//! GCE/Cloud Run metadata server. The metadata server is asked for a fresh
//! token on every call; nothing is cached between requests.

use crate::config::ServiceConfig;
use crate::error::TimetableError;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::debug;

const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// How outgoing Google API requests are authorised.
#[derive(Clone)]
pub enum GoogleAuth {
    /// `?key=` query parameter.
    ApiKey(String),
    /// Static `Authorization: Bearer` token.
    AccessToken(String),
    /// Token fetched from the metadata server at `host`.
    MetadataServer { host: String },
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoogleAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            GoogleAuth::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            GoogleAuth::MetadataServer { host } => {
                f.debug_struct("MetadataServer").field("host", host).finish()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl GoogleAuth {
    pub fn from_config(config: &ServiceConfig) -> Self {
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            return GoogleAuth::ApiKey(key.to_string());
        }
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
            return GoogleAuth::AccessToken(token.to_string());
        }
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        GoogleAuth::MetadataServer { host }
    }

    /// Attach credentials to `request`.
    pub async fn authorize(
        &self,
        client: &reqwest::Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, TimetableError> {
        match self {
            GoogleAuth::ApiKey(key) => Ok(request.query(&[("key", key.as_str())])),
            GoogleAuth::AccessToken(token) => Ok(request.bearer_auth(token)),
            GoogleAuth::MetadataServer { host } => {
                let token = fetch_metadata_token(client, host).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }
}

async fn fetch_metadata_token(client: &reqwest::Client, host: &str) -> Result<String, TimetableError> {
    let url = format!("http://{host}{TOKEN_PATH}");
    debug!("Fetching access token from {}", url);

    let response = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| TimetableError::Credentials(format!("metadata server unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TimetableError::Credentials(format!(
            "metadata server returned {status}: {body}"
        )));
    }

    let token: MetadataToken = response
        .json()
        .await
        .map_err(|e| TimetableError::Credentials(format!("bad token response: {e}")))?;
    Ok(token.access_token)
}
