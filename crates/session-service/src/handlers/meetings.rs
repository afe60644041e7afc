//! Meeting session handlers.
//!
//! - `POST /join` - Find-or-create a meeting and mint an attendee
//! - `POST /end` - End a meeting at the provider and drop its state
//! - `GET /attendee` - Look up an attendee of a live meeting
//!
//! Bodies are deserialized by hand so malformed input is a 400, not
//! Axum's default 422.

use crate::errors::SessionError;
use crate::models::{AttendeeQuery, EndMeetingRequest, JoinMeetingRequest};
use crate::observability::metrics;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use common::types::{AttendeeInfo, JoinInfo, JoinResponse, MessageResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Parse a JSON request body. An empty body parses as `T::default()`.
fn parse_body<T>(body: &Bytes) -> Result<T, SessionError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "session.handlers.meetings", error = %e, "Invalid request body");
        SessionError::BadRequest("Invalid request body".to_string())
    })
}

// ============================================================================
// Handler: POST /join
// ============================================================================

/// Handler for POST /join
///
/// # Request Body
///
/// ```json
/// { "title": "standup", "attendeeName": "Alice", "region": "us-east-1", "ns_es": "true" }
/// ```
///
/// # Response
///
/// - 201 Created: `{"JoinInfo": {"Title", "Meeting", "Attendee"}}`
/// - 400 Bad Request: Missing or malformed fields
/// - 403 Forbidden: Provider rejected the call
/// - 500 Internal Server Error: Provider returned no meeting
#[instrument(
    skip_all,
    name = "session.meeting.join",
    fields(
        method = "POST",
        endpoint = "/join",
        status = tracing::field::Empty,
    )
)]
pub async fn join_meeting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<JoinResponse>), SessionError> {
    let start = Instant::now();

    let result = async {
        let request: JoinMeetingRequest = parse_body(&body)?;
        let params = request
            .validate()
            .map_err(|e| SessionError::BadRequest(e.to_string()))?;
        state.issuer.join(params).await
    }
    .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::record_join(e.kind(), false, start.elapsed());
            tracing::Span::current().record("status", e.status_code());
            return Err(e);
        }
    };

    metrics::record_join("success", outcome.meeting_created, start.elapsed());
    tracing::Span::current().record("status", 201);

    info!(
        target: "session.handlers.meetings",
        provider_meeting_id = %outcome.meeting.provider_meeting_id,
        attendee_id = %outcome.attendee.attendee_id,
        meeting_created = outcome.meeting_created,
        "Attendee joined meeting"
    );

    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            join_info: JoinInfo {
                title: outcome.meeting.title.clone(),
                meeting: outcome.meeting.to_info(),
                attendee: outcome.attendee.to_info(),
            },
        }),
    ))
}

// ============================================================================
// Handler: POST /end
// ============================================================================

/// Handler for POST /end
///
/// # Response
///
/// - 200 OK: `{"message": "Meeting ended successfully"}`
/// - 400 Bad Request: Missing title
/// - 404 Not Found: No meeting for the title
/// - 403 Forbidden: Provider delete failed; meeting still registered
#[instrument(
    skip_all,
    name = "session.meeting.end",
    fields(
        method = "POST",
        endpoint = "/end",
        status = tracing::field::Empty,
    )
)]
pub async fn end_meeting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, SessionError> {
    let result = async {
        let request: EndMeetingRequest = parse_body(&body)?;
        let title = request
            .validate()
            .map_err(|e| SessionError::BadRequest(e.to_string()))?;
        state.teardown.end(&title).await
    }
    .await;

    match result {
        Ok(record) => {
            metrics::record_meeting_ended("success");
            tracing::Span::current().record("status", 200);
            info!(
                target: "session.handlers.meetings",
                provider_meeting_id = %record.provider_meeting_id,
                "Meeting ended"
            );
            Ok(Json(MessageResponse {
                message: "Meeting ended successfully".to_string(),
            }))
        }
        Err(e) => {
            metrics::record_meeting_ended(e.kind());
            tracing::Span::current().record("status", e.status_code());
            Err(e)
        }
    }
}

// ============================================================================
// Handler: GET /attendee
// ============================================================================

/// Handler for GET /attendee?title=..&attendeeId=..
///
/// # Response
///
/// - 200 OK: Attendee object
/// - 400 Bad Request: Missing query parameters
/// - 404 Not Found: Unknown meeting or attendee
#[instrument(skip_all, name = "session.attendee.get")]
pub async fn get_attendee(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AttendeeQuery>,
) -> Result<Json<AttendeeInfo>, SessionError> {
    let (title, attendee_id) = query
        .validate()
        .map_err(|e| SessionError::BadRequest(e.to_string()))?;

    let attendee = state.registry.get_attendee(&title, &attendee_id).await?;
    Ok(Json(attendee.to_info()))
}
