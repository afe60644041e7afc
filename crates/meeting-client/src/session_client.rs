//! HTTP client for the session service.
//!
//! Wraps `POST /join`, `POST /end` and `GET /attendee`. Join tokens in the
//! returned objects are redacted from `Debug` output by the wire types.

use crate::errors::SessionClientError;
use common::types::{
    AttendeeInfo, EndRequest, ErrorResponse, JoinInfo, JoinRequest, JoinResponse, MessageResponse,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default timeout for session service calls.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SessionClient {
    client: Client,
    base_url: String,
}

impl SessionClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SessionClientError> {
        Self::with_timeout(base_url, DEFAULT_SESSION_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SessionClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SessionClientError::InvalidUrl(base_url));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join (creating if needed) the meeting for `request.title`.
    #[instrument(skip_all, name = "client.session.join", fields(title = %request.title))]
    pub async fn join(&self, request: &JoinRequest) -> Result<JoinInfo, SessionClientError> {
        let response = self
            .client
            .post(format!("{}/join", self.base_url))
            .json(request)
            .send()
            .await?;

        let body: JoinResponse = Self::decode(response).await?;
        debug!(
            target: "client.session",
            meeting_id = %body.join_info.meeting.meeting_id,
            attendee_id = %body.join_info.attendee.attendee_id,
            "Joined meeting"
        );
        Ok(body.join_info)
    }

    /// End the meeting for `title`.
    #[instrument(skip_all, name = "client.session.end", fields(title = %title))]
    pub async fn end(&self, title: &str) -> Result<(), SessionClientError> {
        let response = self
            .client
            .post(format!("{}/end", self.base_url))
            .json(&EndRequest {
                title: title.to_string(),
            })
            .send()
            .await?;

        let _: MessageResponse = Self::decode(response).await?;
        Ok(())
    }

    /// Look up one attendee of a live meeting.
    #[instrument(skip_all, name = "client.session.attendee")]
    pub async fn attendee(
        &self,
        title: &str,
        attendee_id: &str,
    ) -> Result<AttendeeInfo, SessionClientError> {
        let response = self
            .client
            .get(format!("{}/attendee", self.base_url))
            .query(&[("title", title), ("attendeeId", attendee_id)])
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SessionClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let status = status.as_u16();
        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => ("UNKNOWN".to_string(), text),
        };

        warn!(
            target: "client.session",
            status,
            code = %code,
            "Session service returned error"
        );

        Err(SessionClientError::Api {
            status,
            code,
            message,
        })
    }
}
