//! Attendee issuance.
//!
//! Every join mints a fresh provider attendee, including repeat joins by the
//! same person. Only the meeting is shared.

use crate::errors::SessionError;
use crate::models::{AttendeeRecord, JoinParams, MeetingRecord};
use crate::services::meeting_registry::{MeetingParams, MeetingRegistry};
use crate::services::provider_client::ProviderClient;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Outcome of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub meeting: MeetingRecord,
    pub attendee: AttendeeRecord,
    /// True if this join created the meeting.
    pub meeting_created: bool,
}

#[derive(Clone)]
pub struct AttendeeIssuer {
    registry: Arc<MeetingRegistry>,
    provider: Arc<dyn ProviderClient>,
    default_region: String,
}

impl AttendeeIssuer {
    pub fn new(
        registry: Arc<MeetingRegistry>,
        provider: Arc<dyn ProviderClient>,
        default_region: String,
    ) -> Self {
        Self {
            registry,
            provider,
            default_region,
        }
    }

    /// Join `params.title` as `params.attendee_name`.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the title or name is blank
    /// - `Provider` if the provider rejects meeting or attendee creation
    /// - `NotFound` if the meeting is ended while the attendee is minted
    #[instrument(skip_all, name = "session.issuer.join", fields(title = %params.title))]
    pub async fn join(&self, params: JoinParams) -> Result<JoinOutcome, SessionError> {
        if params.title.trim().is_empty() || params.attendee_name.trim().is_empty() {
            return Err(SessionError::BadRequest(
                "Missing required fields: title and attendeeName".to_string(),
            ));
        }

        let meeting_params = MeetingParams {
            media_region: params
                .region
                .clone()
                .unwrap_or_else(|| self.default_region.clone()),
            echo_reduction: params.echo_reduction,
        };

        let resolved = self
            .registry
            .create_or_get(&params.title, &meeting_params)
            .await?;
        let meeting = resolved.record;

        let external_user_id = Uuid::new_v4().to_string();
        let issued = self
            .provider
            .create_attendee(&meeting.provider_meeting_id, &external_user_id)
            .await?;

        let attendee = AttendeeRecord {
            attendee_id: issued.attendee_id,
            external_user_id: if issued.external_user_id.is_empty() {
                external_user_id
            } else {
                issued.external_user_id
            },
            join_token: issued.join_token,
            display_name: params.attendee_name,
            title: params.title,
        };

        self.registry
            .add_attendee(&meeting.provider_meeting_id, attendee.clone())
            .await?;

        info!(
            target: "session.issuer",
            provider_meeting_id = %meeting.provider_meeting_id,
            attendee_id = %attendee.attendee_id,
            meeting_created = resolved.created,
            "Attendee issued"
        );

        Ok(JoinOutcome {
            meeting,
            attendee,
            meeting_created: resolved.created,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryMeetingStore;
    use crate::services::provider_client::mock::MockProviderClient;

    fn issuer_with(provider: Arc<MockProviderClient>) -> AttendeeIssuer {
        let registry = Arc::new(MeetingRegistry::new(
            Arc::new(InMemoryMeetingStore::new()),
            Arc::clone(&provider) as Arc<dyn ProviderClient>,
        ));
        AttendeeIssuer::new(registry, provider, "us-east-1".to_string())
    }

    fn params(title: &str, name: &str) -> JoinParams {
        JoinParams {
            title: title.to_string(),
            attendee_name: name.to_string(),
            region: None,
            echo_reduction: false,
        }
    }

    #[tokio::test]
    async fn test_repeat_joins_share_meeting_but_not_attendee() {
        let provider = Arc::new(MockProviderClient::accepting());
        let issuer = issuer_with(Arc::clone(&provider));

        let first = issuer.join(params("standup", "Alice")).await.unwrap();
        let second = issuer.join(params("standup", "Alice")).await.unwrap();

        assert!(first.meeting_created);
        assert!(!second.meeting_created);
        assert_eq!(
            first.meeting.provider_meeting_id,
            second.meeting.provider_meeting_id
        );
        assert_ne!(first.attendee.attendee_id, second.attendee.attendee_id);
        assert_ne!(
            first.attendee.external_user_id,
            second.attendee.external_user_id
        );
        assert_eq!(provider.create_meeting_calls(), 1);
        assert_eq!(provider.create_attendee_calls(), 2);
    }

    #[tokio::test]
    async fn test_join_uses_default_region() {
        let provider = Arc::new(MockProviderClient::accepting());
        let issuer = issuer_with(Arc::clone(&provider));

        let outcome = issuer.join(params("standup", "Alice")).await.unwrap();
        assert_eq!(outcome.meeting.media_region, "us-east-1");

        let with_region = JoinParams {
            region: Some("ap-south-1".to_string()),
            ..params("retro", "Bob")
        };
        let outcome = issuer.join(with_region).await.unwrap();
        assert_eq!(outcome.meeting.media_region, "ap-south-1");
    }

    #[tokio::test]
    async fn test_attendee_record_keeps_display_name() {
        let issuer = issuer_with(Arc::new(MockProviderClient::accepting()));

        let outcome = issuer.join(params("standup", "Alice")).await.unwrap();
        assert_eq!(outcome.attendee.display_name, "Alice");
        assert_eq!(outcome.attendee.title, "standup");
        assert!(Uuid::parse_str(&outcome.attendee.external_user_id).is_ok());
    }

    #[tokio::test]
    async fn test_blank_fields_rejected_without_provider_calls() {
        let provider = Arc::new(MockProviderClient::accepting());
        let issuer = issuer_with(Arc::clone(&provider));

        let result = issuer.join(params("  ", "Alice")).await;
        assert!(matches!(result, Err(SessionError::BadRequest(_))));
        let result = issuer.join(params("standup", "")).await;
        assert!(matches!(result, Err(SessionError::BadRequest(_))));

        assert_eq!(provider.create_meeting_calls(), 0);
        assert_eq!(provider.create_attendee_calls(), 0);
    }

    #[tokio::test]
    async fn test_attendee_failure_is_provider_error_without_retry() {
        let provider = Arc::new(MockProviderClient::failing_create_attendee("attendee limit"));
        let issuer = issuer_with(Arc::clone(&provider));

        let result = issuer.join(params("standup", "Alice")).await;
        assert!(matches!(result, Err(SessionError::Provider(msg)) if msg == "attendee limit"));
        assert_eq!(provider.create_attendee_calls(), 1);
    }
}
