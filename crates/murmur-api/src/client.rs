use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use murmur_sync::{FetchError, HistorySource};
use murmur_types::api::{ApiErrorBody, MeResponse, MessagesResponse};
use murmur_types::models::{ChannelDetail, ChannelId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// REST client for the chat backend.
///
/// Authentication is not handled here: an already-issued session cookie can
/// be forwarded with every request. Every request is bounded by `timeout`;
/// one that runs over fails as [`FetchError::Transport`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cookie: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        cookie: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            cookie,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The signed-in user and the channels they belong to.
    pub async fn get_me(&self) -> Result<MeResponse, FetchError> {
        self.get("/me", &[]).await
    }

    /// Every channel with its members.
    pub async fn list_channels(&self) -> Result<Vec<ChannelDetail>, FetchError> {
        self.get("/servers", &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        decode_response(status, &body).inspect_err(|e| warn!("GET {} failed: {}", path, e))
    }
}

impl HistorySource for ApiClient {
    async fn get_messages(
        &self,
        channel_id: ChannelId,
        page: u32,
    ) -> Result<MessagesResponse, FetchError> {
        self.get(
            &format!("/servers/{}/messages", channel_id),
            &[("page", page.to_string())],
        )
        .await
    }

    async fn get_channel(&self, channel_id: ChannelId) -> Result<ChannelDetail, FetchError> {
        self.get(&format!("/servers/{}", channel_id), &[]).await
    }
}

/// Non-2xx bodies in the backend's error shape become [`FetchError::Api`];
/// anything else keeps just the status code.
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, FetchError> {
    if !status.is_success() {
        return Err(match serde_json::from_slice::<ApiErrorBody>(body) {
            Ok(error) => error.into(),
            Err(_) => FetchError::Http(status.as_u16()),
        });
    }
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}
