//! Meeting registry.
//!
//! Maps a meeting title to the provider meeting that serves it. Lookups and
//! creation for one title are serialized through a per-title async mutex, so
//! concurrent joins for a brand-new title create exactly one provider
//! meeting. Titles never contend with each other.
//!
//! Creation and removal pair a provider call with a store write. Both run on
//! their own task so that dropping the caller's future (request timeout,
//! client disconnect) cannot split the pair.

use crate::errors::SessionError;
use crate::models::{AttendeeRecord, MeetingRecord};
use crate::observability::metrics;
use crate::repositories::MeetingStore;
use crate::services::provider_client::{CreateMeetingRequest, ProviderClient};
use chrono::Utc;
use common::types::{external_meeting_id, MeetingFeatures};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, Instrument, Span};
use uuid::Uuid;

/// Provider-side settings for a meeting that may need to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingParams {
    pub media_region: String,
    pub echo_reduction: bool,
}

/// Result of [`MeetingRegistry::create_or_get`].
#[derive(Debug, Clone)]
pub struct ResolvedMeeting {
    pub record: MeetingRecord,
    /// True if this call created the provider meeting.
    pub created: bool,
}

/// Table of per-title locks.
///
/// An entry lives while any task holds or waits on it. The table itself is
/// only touched in short synchronous sections, so [`TitleGuard`] can prune
/// it from `Drop`.
#[derive(Default)]
struct TitleLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TitleLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(self: &Arc<Self>, title: &str) -> TitleGuard {
        let mut held = TitleGuard {
            locks: Arc::clone(self),
            title: title.to_string(),
            guard: None,
        };
        let lock = Arc::clone(self.table().entry(title.to_string()).or_default());
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

/// Holds one title's lock and drops the table entry once nobody else
/// references it.
struct TitleGuard {
    locks: Arc<TitleLocks>,
    title: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TitleGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.locks.table();
        if table
            .get(&self.title)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.title);
        }
    }
}

struct RegistryInner {
    store: Arc<dyn MeetingStore>,
    provider: Arc<dyn ProviderClient>,
    locks: Arc<TitleLocks>,
}

/// Title-keyed registry of live meetings.
pub struct MeetingRegistry {
    inner: Arc<RegistryInner>,
}

/// Run `work` on its own task and wait for it.
///
/// The task keeps running if the caller is dropped.
async fn run_detached<T, Fut>(work: Fut) -> Result<T, SessionError>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
{
    tokio::spawn(work.instrument(Span::current()))
        .await
        .map_err(|e| {
            error!(target: "session.registry", error = %e, "Registry task did not complete");
            SessionError::Internal(format!("registry task failed: {}", e))
        })?
}

impl MeetingRegistry {
    pub fn new(store: Arc<dyn MeetingStore>, provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                provider,
                locks: Arc::new(TitleLocks::default()),
            }),
        }
    }

    /// Return the meeting for `title`, creating it at the provider if absent.
    ///
    /// An existing record is returned unchanged without a provider call. A
    /// creation that has started runs to completion even if the caller
    /// stops waiting, so the provider meeting is always recorded.
    #[instrument(skip_all, name = "session.registry.create_or_get", fields(title = %title))]
    pub async fn create_or_get(
        &self,
        title: &str,
        params: &MeetingParams,
    ) -> Result<ResolvedMeeting, SessionError> {
        let inner = Arc::clone(&self.inner);
        let title = title.to_string();
        let params = params.clone();
        run_detached(async move {
            let _guard = inner.locks.acquire(&title).await;
            inner.create_or_get_locked(&title, &params).await
        })
        .await
    }

    /// Look up a meeting by title.
    pub async fn get(&self, title: &str) -> Result<MeetingRecord, SessionError> {
        self.inner.get(title).await
    }

    /// Remove a meeting and its attendees.
    pub async fn delete(&self, title: &str) -> Result<MeetingRecord, SessionError> {
        self.delete_with(title, |_| async { Ok(()) }).await
    }

    /// Remove a meeting after `before_remove` succeeds.
    ///
    /// The step runs under the title lock with the current record. If it
    /// fails, the registry is left untouched and its error is returned.
    /// Once started, the step and the removal finish together even if the
    /// caller stops waiting.
    #[instrument(skip_all, name = "session.registry.delete", fields(title = %title))]
    pub async fn delete_with<F, Fut>(
        &self,
        title: &str,
        before_remove: F,
    ) -> Result<MeetingRecord, SessionError>
    where
        F: FnOnce(MeetingRecord) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let title = title.to_string();
        run_detached(async move {
            let _guard = inner.locks.acquire(&title).await;
            inner.delete_locked(&title, before_remove).await
        })
        .await
    }

    /// Record an attendee minted against `provider_meeting_id`.
    ///
    /// Fails with `NotFound` if the meeting was ended, or replaced by a new
    /// provider meeting, while the attendee was being minted.
    pub async fn add_attendee(
        &self,
        provider_meeting_id: &str,
        attendee: AttendeeRecord,
    ) -> Result<(), SessionError> {
        let _guard = self.inner.locks.acquire(&attendee.title).await;
        self.inner
            .store
            .insert_attendee(provider_meeting_id, attendee)
            .await
    }

    /// Look up an attendee of a meeting.
    pub async fn get_attendee(
        &self,
        title: &str,
        attendee_id: &str,
    ) -> Result<AttendeeRecord, SessionError> {
        self.inner
            .store
            .get_attendee(title, attendee_id)
            .await?
            .ok_or_else(|| SessionError::NotFound("Attendee not found".to_string()))
    }

    /// Number of live meetings.
    pub async fn meeting_count(&self) -> Result<usize, SessionError> {
        self.inner.store.meeting_count().await
    }
}

impl RegistryInner {
    async fn get(&self, title: &str) -> Result<MeetingRecord, SessionError> {
        self.store
            .get_meeting(title)
            .await?
            .ok_or_else(|| SessionError::NotFound("Meeting not found".to_string()))
    }

    async fn create_or_get_locked(
        &self,
        title: &str,
        params: &MeetingParams,
    ) -> Result<ResolvedMeeting, SessionError> {
        if let Some(record) = self.store.get_meeting(title).await? {
            debug!(
                target: "session.registry",
                provider_meeting_id = %record.provider_meeting_id,
                "Reusing existing meeting"
            );
            return Ok(ResolvedMeeting {
                record,
                created: false,
            });
        }

        let features = params
            .echo_reduction
            .then(MeetingFeatures::with_echo_reduction);
        let request = CreateMeetingRequest {
            client_request_token: Uuid::new_v4().to_string(),
            media_region: params.media_region.clone(),
            external_meeting_id: external_meeting_id(title),
            meeting_features: features.clone(),
        };

        let meeting = self.provider.create_meeting(&request).await?;

        let record = MeetingRecord {
            title: title.to_string(),
            provider_meeting_id: meeting.meeting_id,
            external_meeting_id: request.external_meeting_id,
            media_region: if meeting.media_region.is_empty() {
                request.media_region
            } else {
                meeting.media_region
            },
            media_placement: meeting.media_placement,
            features: meeting
                .meeting_features
                .or(features)
                .unwrap_or_default(),
            created_at: Utc::now(),
        };

        self.store.insert_meeting(record.clone()).await?;
        self.refresh_meeting_gauge().await;

        info!(
            target: "session.registry",
            provider_meeting_id = %record.provider_meeting_id,
            media_region = %record.media_region,
            "Meeting created"
        );

        Ok(ResolvedMeeting {
            record,
            created: true,
        })
    }

    async fn delete_locked<F, Fut>(
        &self,
        title: &str,
        before_remove: F,
    ) -> Result<MeetingRecord, SessionError>
    where
        F: FnOnce(MeetingRecord) -> Fut,
        Fut: Future<Output = Result<(), SessionError>>,
    {
        let record = self.get(title).await?;
        before_remove(record.clone()).await?;

        self.store.remove_meeting(title).await?;
        self.refresh_meeting_gauge().await;

        info!(
            target: "session.registry",
            provider_meeting_id = %record.provider_meeting_id,
            "Meeting removed"
        );
        Ok(record)
    }

    async fn refresh_meeting_gauge(&self) {
        if let Ok(count) = self.store.meeting_count().await {
            metrics::set_active_meetings(count);
        }
    }
}
