//! Client for the Journey diary REST API.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::ApiConfig;

mod models;

pub use models::{Entry, EntryPayload, EntryStats, Notebook};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API configuration: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The server calls the editor depends on.
pub trait DiaryApi: Send + Sync {
    fn list_notebooks(&self) -> Result<Vec<Notebook>, ApiError>;
    fn get_entry(&self, id: i64) -> Result<Entry, ApiError>;
    fn create_entry(&self, payload: &EntryPayload) -> Result<Entry, ApiError>;
    fn update_entry(&self, id: i64, payload: &EntryPayload) -> Result<Entry, ApiError>;
    /// Idempotent; returns the notebook drafts are filed under.
    fn ensure_drafts_notebook(&self) -> Result<Notebook, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpDiaryApi {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpDiaryApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let client = build_client(config.timeout())?;
        Ok(Self {
            base_url,
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, ApiError> {
        let response = self.authorized(request).send()?;
        let response = check_status(response)?;
        response
            .json::<T>()
            .map_err(|error| ApiError::Decode(format!("{what}: {error}")))
    }
}

impl DiaryApi for HttpDiaryApi {
    fn list_notebooks(&self) -> Result<Vec<Notebook>, ApiError> {
        self.send(self.client.get(self.url("/notebooks/")), "notebook list")
    }

    fn get_entry(&self, id: i64) -> Result<Entry, ApiError> {
        self.send(self.client.get(self.url(&format!("/diaries/{id}"))), "entry")
    }

    fn create_entry(&self, payload: &EntryPayload) -> Result<Entry, ApiError> {
        tracing::debug!(notebook_id = payload.notebook_id, "creating entry");
        self.send(
            self.client.post(self.url("/diaries/")).json(payload),
            "created entry",
        )
    }

    fn update_entry(&self, id: i64, payload: &EntryPayload) -> Result<Entry, ApiError> {
        tracing::debug!(entry_id = id, "updating entry");
        self.send(
            self.client
                .put(self.url(&format!("/diaries/{id}")))
                .json(payload),
            "updated entry",
        )
    }

    fn ensure_drafts_notebook(&self) -> Result<Notebook, ApiError> {
        self.send(
            self.client.get(self.url("/notebooks/drafts/ensure")),
            "drafts notebook",
        )
    }
}

fn build_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("journey/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| ApiError::Config(format!("failed to construct HTTP client: {error}")))
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(ApiError::Status {
        status,
        body: compact_text(&body),
    })
}

/// Trims the server root and makes it end in `/api`.
fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(ApiError::Config("API base URL must not be empty".into()));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(ApiError::Config(
            "API base URL must include http:// or https://".into(),
        ));
    }
    if base.ends_with("/api") {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}/api"))
    }
}

fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn normalize_base_url_appends_api_segment_once() {
        assert_eq!(
            normalize_base_url("http://localhost:8000").ok().as_deref(),
            Some("http://localhost:8000/api")
        );
        assert_eq!(
            normalize_base_url(" https://diary.example.com/api/ ").ok().as_deref(),
            Some("https://diary.example.com/api")
        );
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert_matches!(normalize_base_url(""), Err(ApiError::Config(_)));
        assert_matches!(normalize_base_url("diary.example.com"), Err(ApiError::Config(_)));
    }

    #[test]
    fn compact_text_limits_error_bodies() {
        let long = format!("  {}  ", "e".repeat(500));
        assert_eq!(compact_text(&long).len(), 180);
    }

    #[test]
    fn blank_token_is_not_sent() {
        let config = ApiConfig {
            token: Some("   ".into()),
            ..ApiConfig::default()
        };
        let api = HttpDiaryApi::new(&config).expect("client builds");
        assert!(api.token.is_none());
        assert_eq!(api.base_url(), "http://localhost:8000/api");
    }
}
