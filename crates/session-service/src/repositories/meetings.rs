//! Meeting store.
//!
//! Keyed by meeting title. Each meeting entry owns its attendee sub-map, so
//! removing a meeting removes its attendees in the same write.
//!
//! The store does no provider I/O and takes no per-title locks; callers that
//! need check-then-act atomicity go through
//! [`MeetingRegistry`](crate::services::meeting_registry::MeetingRegistry).

use crate::errors::SessionError;
use crate::models::{AttendeeRecord, MeetingRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;

/// Storage backend for meetings and their attendees.
///
/// Methods return `Result` so persistent backends can surface I/O errors.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn get_meeting(&self, title: &str) -> Result<Option<MeetingRecord>, SessionError>;

    /// Insert a meeting with an empty attendee map, replacing any previous
    /// entry for the title.
    async fn insert_meeting(&self, record: MeetingRecord) -> Result<(), SessionError>;

    /// Remove a meeting and all of its attendees.
    async fn remove_meeting(&self, title: &str) -> Result<Option<MeetingRecord>, SessionError>;

    /// Store an attendee under its parent meeting.
    ///
    /// Fails with `NotFound` unless the parent exists and still carries
    /// `provider_meeting_id`.
    async fn insert_attendee(
        &self,
        provider_meeting_id: &str,
        attendee: AttendeeRecord,
    ) -> Result<(), SessionError>;

    async fn get_attendee(
        &self,
        title: &str,
        attendee_id: &str,
    ) -> Result<Option<AttendeeRecord>, SessionError>;

    async fn meeting_count(&self) -> Result<usize, SessionError>;
}

#[derive(Debug)]
struct MeetingEntry {
    record: MeetingRecord,
    attendees: HashMap<String, AttendeeRecord>,
}

/// Process-local [`MeetingStore`].
#[derive(Debug, Default)]
pub struct InMemoryMeetingStore {
    meetings: RwLock<HashMap<String, MeetingEntry>>,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn get_meeting(&self, title: &str) -> Result<Option<MeetingRecord>, SessionError> {
        let meetings = self.meetings.read().await;
        Ok(meetings.get(title).map(|entry| entry.record.clone()))
    }

    #[instrument(skip_all, fields(title = %record.title))]
    async fn insert_meeting(&self, record: MeetingRecord) -> Result<(), SessionError> {
        let mut meetings = self.meetings.write().await;
        meetings.insert(
            record.title.clone(),
            MeetingEntry {
                record,
                attendees: HashMap::new(),
            },
        );
        Ok(())
    }

    #[instrument(skip_all, fields(title = %title))]
    async fn remove_meeting(&self, title: &str) -> Result<Option<MeetingRecord>, SessionError> {
        let mut meetings = self.meetings.write().await;
        Ok(meetings.remove(title).map(|entry| entry.record))
    }

    #[instrument(skip_all, fields(title = %attendee.title))]
    async fn insert_attendee(
        &self,
        provider_meeting_id: &str,
        attendee: AttendeeRecord,
    ) -> Result<(), SessionError> {
        let mut meetings = self.meetings.write().await;
        match meetings.get_mut(&attendee.title) {
            Some(entry) if entry.record.provider_meeting_id == provider_meeting_id => {
                entry
                    .attendees
                    .insert(attendee.attendee_id.clone(), attendee);
                Ok(())
            }
            _ => Err(SessionError::NotFound("Meeting not found".to_string())),
        }
    }

    async fn get_attendee(
        &self,
        title: &str,
        attendee_id: &str,
    ) -> Result<Option<AttendeeRecord>, SessionError> {
        let meetings = self.meetings.read().await;
        Ok(meetings
            .get(title)
            .and_then(|entry| entry.attendees.get(attendee_id))
            .cloned())
    }

    async fn meeting_count(&self) -> Result<usize, SessionError> {
        Ok(self.meetings.read().await.len())
    }
}
