//! HTTP client for the meetings API
//!
//! Lists and deletes meetings under `{base_url}/api/meetings`. Requests
//! carry the session's bearer token when one is set; the token is read
//! again for every request so sign-in changes apply to running pollers.

use crate::error::MeetingsError;
use crate::meeting::Meeting;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for meetings API requests in seconds.
const MEETINGS_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Source of the meeting list
#[async_trait]
pub trait MeetingSource: Send + Sync {
    /// Fetch all meetings visible to the current user
    async fn list_meetings(&self) -> Result<Vec<Meeting>, MeetingsError>;

    /// Delete a meeting
    async fn delete_meeting(&self, id: &str) -> Result<(), MeetingsError>;
}

/// Supplies the bearer token for API requests
pub trait TokenSource: Send + Sync {
    /// Current token, if signed in
    fn token(&self) -> Option<String>;
}

impl TokenSource for String {
    fn token(&self) -> Option<String> {
        Some(self.clone())
    }
}

/// HTTP client for the meetings API
#[derive(Clone)]
pub struct MeetingsClient {
    client: Client,
    base_url: String,
    token: Option<Arc<dyn TokenSource>>,
}

impl MeetingsClient {
    /// Create a client for the API at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `MeetingsError::InvalidConfiguration` if the URL is empty or
    /// invalid, or the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, MeetingsError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(MeetingsError::InvalidConfiguration {
                message: "API URL must not be empty".to_string(),
            });
        }
        Url::parse(&base_url).map_err(|e| MeetingsError::InvalidConfiguration {
            message: format!("invalid API URL '{}': {}", base_url, e),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(MEETINGS_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| MeetingsError::InvalidConfiguration {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Authenticate requests with a fixed `token`
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Arc::new(token.into()));
        self
    }

    /// Authenticate requests with whatever token `source` holds at send time
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token = Some(source);
        self
    }

    /// API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/meetings`
    pub async fn list(&self) -> Result<Vec<Meeting>, MeetingsError> {
        let url = self.meetings_url()?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_status(response).await?;

        let meetings: Vec<Meeting> =
            response
                .json()
                .await
                .map_err(|e| MeetingsError::InvalidResponse {
                    message: e.to_string(),
                })?;
        debug!("Fetched {} meetings", meetings.len());
        Ok(meetings)
    }

    /// `DELETE /api/meetings/{id}`
    pub async fn delete(&self, id: &str) -> Result<(), MeetingsError> {
        let mut url = self.meetings_url()?;
        url.path_segments_mut()
            .map_err(|_| MeetingsError::InvalidConfiguration {
                message: format!("API URL '{}' cannot hold a path", self.base_url),
            })?
            .push(id);
        let response = self.authorized(self.client.delete(url)).send().await?;
        Self::check_status(response).await?;
        debug!("Deleted meeting {}", id);
        Ok(())
    }

    fn meetings_url(&self) -> Result<Url, MeetingsError> {
        Url::parse(&format!("{}/api/meetings", self.base_url)).map_err(|e| {
            MeetingsError::InvalidConfiguration {
                message: format!("invalid API URL '{}': {}", self.base_url, e),
            }
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_ref().and_then(|source| source.token()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MeetingsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Meetings API returned {}", status);
        Err(MeetingsError::request_failed(status.as_u16(), &body))
    }
}

#[async_trait]
impl MeetingSource for MeetingsClient {
    async fn list_meetings(&self) -> Result<Vec<Meeting>, MeetingsError> {
        self.list().await
    }

    async fn delete_meeting(&self, id: &str) -> Result<(), MeetingsError> {
        self.delete(id).await
    }
}
