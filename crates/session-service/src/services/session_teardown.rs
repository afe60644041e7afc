//! Meeting teardown.

use crate::errors::SessionError;
use crate::models::MeetingRecord;
use crate::services::meeting_registry::MeetingRegistry;
use crate::services::provider_client::ProviderClient;
use std::sync::Arc;
use tracing::{info, instrument};

/// Ends meetings: provider delete first, then the cascading local removal.
#[derive(Clone)]
pub struct SessionTeardown {
    registry: Arc<MeetingRegistry>,
    provider: Arc<dyn ProviderClient>,
}

impl SessionTeardown {
    pub fn new(registry: Arc<MeetingRegistry>, provider: Arc<dyn ProviderClient>) -> Self {
        Self { registry, provider }
    }

    /// End the meeting for `title`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no meeting exists for the title
    /// - `Provider` if the provider delete fails; the meeting and its
    ///   attendees stay registered
    #[instrument(skip_all, name = "session.teardown.end", fields(title = %title))]
    pub async fn end(&self, title: &str) -> Result<MeetingRecord, SessionError> {
        let provider = Arc::clone(&self.provider);
        let record = self
            .registry
            .delete_with(title, move |meeting| async move {
                provider.delete_meeting(&meeting.provider_meeting_id).await
            })
            .await?;

        info!(
            target: "session.teardown",
            provider_meeting_id = %record.provider_meeting_id,
            "Meeting ended"
        );
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{AttendeeRecord, JoinParams};
    use crate::repositories::{InMemoryMeetingStore, MeetingStore};
    use crate::services::attendee_issuer::AttendeeIssuer;
    use crate::services::provider_client::mock::MockProviderClient;
    use async_trait::async_trait;
    use std::time::Duration;

    /// In-memory store whose removals stall for `delay`.
    struct SlowRemoveStore {
        inner: InMemoryMeetingStore,
        delay: Duration,
    }

    #[async_trait]
    impl MeetingStore for SlowRemoveStore {
        async fn get_meeting(&self, title: &str) -> Result<Option<MeetingRecord>, SessionError> {
            self.inner.get_meeting(title).await
        }

        async fn insert_meeting(&self, record: MeetingRecord) -> Result<(), SessionError> {
            self.inner.insert_meeting(record).await
        }

        async fn remove_meeting(
            &self,
            title: &str,
        ) -> Result<Option<MeetingRecord>, SessionError> {
            tokio::time::sleep(self.delay).await;
            self.inner.remove_meeting(title).await
        }

        async fn insert_attendee(
            &self,
            provider_meeting_id: &str,
            attendee: AttendeeRecord,
        ) -> Result<(), SessionError> {
            self.inner.insert_attendee(provider_meeting_id, attendee).await
        }

        async fn get_attendee(
            &self,
            title: &str,
            attendee_id: &str,
        ) -> Result<Option<AttendeeRecord>, SessionError> {
            self.inner.get_attendee(title, attendee_id).await
        }

        async fn meeting_count(&self) -> Result<usize, SessionError> {
            self.inner.meeting_count().await
        }
    }

    struct Fixture {
        provider: Arc<MockProviderClient>,
        registry: Arc<MeetingRegistry>,
        issuer: AttendeeIssuer,
        teardown: SessionTeardown,
    }

    fn fixture(provider: MockProviderClient) -> Fixture {
        fixture_with_store(provider, Arc::new(InMemoryMeetingStore::new()))
    }

    fn fixture_with_store(provider: MockProviderClient, store: Arc<dyn MeetingStore>) -> Fixture {
        let provider = Arc::new(provider);
        let registry = Arc::new(MeetingRegistry::new(
            store,
            Arc::clone(&provider) as Arc<dyn ProviderClient>,
        ));
        Fixture {
            issuer: AttendeeIssuer::new(
                Arc::clone(&registry),
                Arc::clone(&provider) as Arc<dyn ProviderClient>,
                "us-east-1".to_string(),
            ),
            teardown: SessionTeardown::new(
                Arc::clone(&registry),
                Arc::clone(&provider) as Arc<dyn ProviderClient>,
            ),
            registry,
            provider,
        }
    }

    fn join(title: &str, name: &str) -> JoinParams {
        JoinParams {
            title: title.to_string(),
            attendee_name: name.to_string(),
            region: None,
            echo_reduction: false,
        }
    }

    #[tokio::test]
    async fn test_end_deletes_provider_meeting_and_attendees() {
        let f = fixture(MockProviderClient::accepting());
        let alice = f.issuer.join(join("standup", "Alice")).await.unwrap();

        let ended = f.teardown.end("standup").await.unwrap();

        assert_eq!(ended.provider_meeting_id, alice.meeting.provider_meeting_id);
        assert_eq!(
            f.provider.deleted_meetings().await,
            vec![alice.meeting.provider_meeting_id.clone()]
        );
        assert!(matches!(
            f.registry
                .get_attendee("standup", &alice.attendee.attendee_id)
                .await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_end_unknown_title_skips_provider() {
        let f = fixture(MockProviderClient::accepting());

        assert!(matches!(
            f.teardown.end("ghost").await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(f.provider.delete_meeting_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_registry_intact() {
        let f = fixture(MockProviderClient::failing_delete_meeting("AccessDenied"));
        let alice = f.issuer.join(join("standup", "Alice")).await.unwrap();

        let result = f.teardown.end("standup").await;

        assert!(matches!(result, Err(SessionError::Provider(msg)) if msg == "AccessDenied"));
        assert!(f.registry.get("standup").await.is_ok());
        assert!(f
            .registry
            .get_attendee("standup", &alice.attendee.attendee_id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_second_end_is_not_found() {
        let f = fixture(MockProviderClient::accepting());
        f.issuer.join(join("standup", "Alice")).await.unwrap();

        f.teardown.end("standup").await.unwrap();
        assert!(matches!(
            f.teardown.end("standup").await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(f.provider.delete_meeting_calls(), 1);
    }

    #[tokio::test]
    async fn test_end_abandoned_mid_removal_still_removes_meeting() {
        let store = Arc::new(SlowRemoveStore {
            inner: InMemoryMeetingStore::new(),
            delay: Duration::from_millis(200),
        });
        let f = fixture_with_store(MockProviderClient::accepting(), store);
        let alice = f.issuer.join(join("standup", "Alice")).await.unwrap();

        let cut_short =
            tokio::time::timeout(Duration::from_millis(50), f.teardown.end("standup")).await;
        assert!(cut_short.is_err(), "end should still be removing");

        let bob = f.issuer.join(join("standup", "Bob")).await.unwrap();

        assert!(bob.meeting_created);
        assert_ne!(
            bob.meeting.provider_meeting_id,
            alice.meeting.provider_meeting_id
        );
        assert_eq!(
            f.provider.deleted_meetings().await,
            vec![alice.meeting.provider_meeting_id.clone()]
        );
        assert!(matches!(
            f.registry
                .get_attendee("standup", &alice.attendee.attendee_id)
                .await,
            Err(SessionError::NotFound(_))
        ));
    }
}
