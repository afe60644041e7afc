//! Conferencing provider client.
//!
//! The provider owns real media transport. This service only asks it to
//! create and delete meetings and to mint attendees. The trait seam lets
//! handlers and tests run against the in-process `mock::MockProviderClient`,
//! compiled for tests and under the `test-utils` feature.
//!
//! # Error mapping
//!
//! - 404 on delete: treated as success (meeting already gone)
//! - any other non-2xx: `SessionError::Provider` carrying the provider's
//!   message verbatim
//! - transport failure: `SessionError::Provider`
//! - 2xx without the expected object: `SessionError::Internal`

use crate::errors::SessionError;
use crate::observability::metrics;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::{AttendeeInfo, MeetingFeatures, MeetingInfo};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Create-meeting call parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateMeetingRequest {
    /// Idempotency token; a retried call with the same token yields the
    /// same provider meeting.
    pub client_request_token: String,

    pub media_region: String,

    pub external_meeting_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_features: Option<MeetingFeatures>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateAttendeeRequest<'a> {
    external_user_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateMeetingResponse {
    meeting: Option<MeetingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateAttendeeResponse {
    attendee: Option<AttendeeInfo>,
}

/// Error body shapes the provider is known to return.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Trait for conferencing provider calls.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Create a provider meeting.
    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest,
    ) -> Result<MeetingInfo, SessionError>;

    /// Mint a new attendee for an existing provider meeting.
    async fn create_attendee(
        &self,
        provider_meeting_id: &str,
        external_user_id: &str,
    ) -> Result<AttendeeInfo, SessionError>;

    /// Delete a provider meeting. Deleting a meeting the provider no longer
    /// knows about succeeds.
    async fn delete_meeting(&self, provider_meeting_id: &str) -> Result<(), SessionError>;

    /// Provider base endpoint, for logs and readiness output.
    fn endpoint(&self) -> &str;
}

/// HTTP implementation of [`ProviderClient`].
#[derive(Clone)]
pub struct HttpProviderClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpProviderClient {
    /// Create a new provider client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "session.provider", error = %e, "Failed to build HTTP client");
                SessionError::Internal(format!("Failed to build provider HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SessionError> {
        let start = Instant::now();
        let result = request
            .header("Authorization", self.bearer())
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = if response.status().is_success() {
                    "success"
                } else {
                    "error"
                };
                metrics::record_provider_request(operation, status, start.elapsed());
                Ok(response)
            }
            Err(e) => {
                metrics::record_provider_request(operation, "error", start.elapsed());
                warn!(target: "session.provider", operation, error = %e, "Provider request failed");
                Err(SessionError::Provider(format!("Provider request failed: {e}")))
            }
        }
    }
}

/// Turn a non-success provider response into a `SessionError::Provider`.
async fn provider_error(response: reqwest::Response) -> SessionError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Provider returned status {}", status.as_u16()));

    warn!(target: "session.provider", status = %status, message = %message, "Provider rejected request");
    SessionError::Provider(message)
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip_all, fields(region = %request.media_region))]
    async fn create_meeting(
        &self,
        request: &CreateMeetingRequest,
    ) -> Result<MeetingInfo, SessionError> {
        let url = format!("{}/meetings", self.base_url);
        let response = self
            .send("create_meeting", self.client.post(&url).json(request))
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: CreateMeetingResponse = response.json().await.map_err(|e| {
            error!(target: "session.provider", error = %e, "Failed to parse create meeting response");
            SessionError::Internal(format!("Failed to create meeting: {e}"))
        })?;

        body.meeting.ok_or_else(|| {
            SessionError::Internal("Failed to create meeting: response had no Meeting".to_string())
        })
    }

    #[instrument(skip_all, fields(provider_meeting_id = %provider_meeting_id))]
    async fn create_attendee(
        &self,
        provider_meeting_id: &str,
        external_user_id: &str,
    ) -> Result<AttendeeInfo, SessionError> {
        let url = format!("{}/meetings/{}/attendees", self.base_url, provider_meeting_id);
        let body = CreateAttendeeRequest { external_user_id };
        let response = self
            .send("create_attendee", self.client.post(&url).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: CreateAttendeeResponse = response.json().await.map_err(|e| {
            error!(target: "session.provider", error = %e, "Failed to parse create attendee response");
            SessionError::Internal(format!("Failed to create attendee: {e}"))
        })?;

        body.attendee.ok_or_else(|| {
            SessionError::Internal(
                "Failed to create attendee: response had no Attendee".to_string(),
            )
        })
    }

    #[instrument(skip_all, fields(provider_meeting_id = %provider_meeting_id))]
    async fn delete_meeting(&self, provider_meeting_id: &str) -> Result<(), SessionError> {
        let url = format!("{}/meetings/{}", self.base_url, provider_meeting_id);
        let response = self
            .send("delete_meeting", self.client.delete(&url))
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            warn!(
                target: "session.provider",
                provider_meeting_id,
                "Provider meeting already gone; treating delete as done"
            );
            Ok(())
        } else {
            Err(provider_error(response).await)
        }
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// Mock provider client for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use common::types::MediaPlacement;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// In-process provider that mints sequential ids and counts calls.
    #[derive(Default)]
    pub struct MockProviderClient {
        create_meeting_calls: AtomicUsize,
        create_attendee_calls: AtomicUsize,
        delete_meeting_calls: AtomicUsize,
        meetings_minted: AtomicUsize,
        attendees_minted: AtomicUsize,
        create_delay: Option<Duration>,
        create_meeting_error: Option<String>,
        create_attendee_error: Option<String>,
        delete_meeting_error: Option<String>,
        create_requests: Mutex<Vec<CreateMeetingRequest>>,
        deleted_meetings: Mutex<Vec<String>>,
    }

    impl MockProviderClient {
        /// Create a mock that accepts every call.
        pub fn accepting() -> Self {
            Self::default()
        }

        /// Delay every create-meeting call, widening race windows in tests.
        pub fn with_create_delay(mut self, delay: Duration) -> Self {
            self.create_delay = Some(delay);
            self
        }

        /// Fail every create-meeting call with the given provider message.
        pub fn failing_create_meeting(message: &str) -> Self {
            Self {
                create_meeting_error: Some(message.to_string()),
                ..Self::default()
            }
        }

        /// Fail every create-attendee call with the given provider message.
        pub fn failing_create_attendee(message: &str) -> Self {
            Self {
                create_attendee_error: Some(message.to_string()),
                ..Self::default()
            }
        }

        /// Fail every delete-meeting call with the given provider message.
        pub fn failing_delete_meeting(message: &str) -> Self {
            Self {
                delete_meeting_error: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn create_meeting_calls(&self) -> usize {
            self.create_meeting_calls.load(Ordering::SeqCst)
        }

        pub fn create_attendee_calls(&self) -> usize {
            self.create_attendee_calls.load(Ordering::SeqCst)
        }

        pub fn delete_meeting_calls(&self) -> usize {
            self.delete_meeting_calls.load(Ordering::SeqCst)
        }

        /// Every create-meeting request received, in order.
        pub async fn create_requests(&self) -> Vec<CreateMeetingRequest> {
            self.create_requests.lock().await.clone()
        }

        /// Provider meeting ids passed to delete, in order.
        pub async fn deleted_meetings(&self) -> Vec<String> {
            self.deleted_meetings.lock().await.clone()
        }
    }

    #[async_trait]
    impl ProviderClient for MockProviderClient {
        async fn create_meeting(
            &self,
            request: &CreateMeetingRequest,
        ) -> Result<MeetingInfo, SessionError> {
            self.create_meeting_calls.fetch_add(1, Ordering::SeqCst);
            self.create_requests.lock().await.push(request.clone());

            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(message) = &self.create_meeting_error {
                return Err(SessionError::Provider(message.clone()));
            }

            let n = self.meetings_minted.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MeetingInfo {
                meeting_id: format!("mock-meeting-{n}"),
                external_meeting_id: Some(request.external_meeting_id.clone()),
                media_region: request.media_region.clone(),
                media_placement: MediaPlacement {
                    audio_host_url: Some(format!("wss://audio.mock/{n}")),
                    signaling_url: Some(format!("wss://signal.mock/{n}")),
                    ..MediaPlacement::default()
                },
                meeting_features: request.meeting_features.clone(),
            })
        }

        async fn create_attendee(
            &self,
            _provider_meeting_id: &str,
            external_user_id: &str,
        ) -> Result<AttendeeInfo, SessionError> {
            self.create_attendee_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(message) = &self.create_attendee_error {
                return Err(SessionError::Provider(message.clone()));
            }

            let n = self.attendees_minted.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AttendeeInfo {
                attendee_id: format!("mock-attendee-{n}"),
                external_user_id: external_user_id.to_string(),
                join_token: format!("mock-join-token-{n}"),
                name: None,
            })
        }

        async fn delete_meeting(&self, provider_meeting_id: &str) -> Result<(), SessionError> {
            self.delete_meeting_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(message) = &self.delete_meeting_error {
                return Err(SessionError::Provider(message.clone()));
            }

            self.deleted_meetings
                .lock()
                .await
                .push(provider_meeting_id.to_string());
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "mock://provider"
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpProviderClient {
        HttpProviderClient::new(
            server.uri(),
            SecretString::from("test-key"),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn create_request() -> CreateMeetingRequest {
        CreateMeetingRequest {
            client_request_token: "9b0d2b8e-token".to_string(),
            media_region: "us-east-1".to_string(),
            external_meeting_id: "standup".to_string(),
            meeting_features: Some(MeetingFeatures::with_echo_reduction()),
        }
    }

    #[test]
    fn test_create_meeting_request_serialization() {
        let json = serde_json::to_value(create_request()).unwrap();
        assert_eq!(json["ClientRequestToken"], "9b0d2b8e-token");
        assert_eq!(json["MediaRegion"], "us-east-1");
        assert_eq!(json["ExternalMeetingId"], "standup");
        assert_eq!(json["MeetingFeatures"]["Audio"]["EchoReduction"], "AVAILABLE");

        let plain = CreateMeetingRequest {
            meeting_features: None,
            ..create_request()
        };
        let json = serde_json::to_value(plain).unwrap();
        assert!(json.get("MeetingFeatures").is_none());
    }

    #[tokio::test]
    async fn test_create_meeting_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "ClientRequestToken": "9b0d2b8e-token",
                "ExternalMeetingId": "standup"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "Meeting": {
                    "MeetingId": "prov-1",
                    "MediaRegion": "us-east-1",
                    "MediaPlacement": {"AudioHostUrl": "wss://audio"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let meeting = client_for(&server)
            .create_meeting(&create_request())
            .await
            .unwrap();

        assert_eq!(meeting.meeting_id, "prov-1");
        assert_eq!(
            meeting.media_placement.audio_host_url.as_deref(),
            Some("wss://audio")
        );
    }

    #[tokio::test]
    async fn test_create_meeting_without_meeting_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let result = client_for(&server).create_meeting(&create_request()).await;
        assert!(matches!(result, Err(SessionError::Internal(_))));
    }

    #[tokio::test]
    async fn test_create_meeting_rejection_is_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "Message": "User is not authorized to perform CreateMeeting"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).create_meeting(&create_request()).await;
        assert!(matches!(
            result,
            Err(SessionError::Provider(msg)) if msg == "User is not authorized to perform CreateMeeting"
        ));
    }

    #[tokio::test]
    async fn test_server_error_without_body_has_status_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings/prov-1/attendees"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .create_attendee("prov-1", "ext-1")
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Provider(msg)) if msg == "Provider returned status 503"
        ));
    }

    #[tokio::test]
    async fn test_create_attendee_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings/prov-1/attendees"))
            .and(body_partial_json(serde_json::json!({"ExternalUserId": "ext-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "Attendee": {
                    "AttendeeId": "att-1",
                    "ExternalUserId": "ext-1",
                    "JoinToken": "jt"
                }
            })))
            .mount(&server)
            .await;

        let attendee = client_for(&server)
            .create_attendee("prov-1", "ext-1")
            .await
            .unwrap();
        assert_eq!(attendee.attendee_id, "att-1");
        assert_eq!(attendee.join_token, "jt");
    }

    #[tokio::test]
    async fn test_delete_meeting_not_found_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/meetings/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete_meeting("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_meeting_forbidden_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/meetings/prov-1"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({"message": "denied"})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).delete_meeting("prov-1").await;
        assert!(matches!(result, Err(SessionError::Provider(msg)) if msg == "denied"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_provider_error() {
        let client = HttpProviderClient::new(
            "http://127.0.0.1:1".to_string(),
            SecretString::from("k"),
            Duration::from_millis(500),
        )
        .unwrap();

        let result = client.delete_meeting("prov-1").await;
        assert!(matches!(result, Err(SessionError::Provider(_))));
    }
}
