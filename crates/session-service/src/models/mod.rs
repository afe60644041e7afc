//! Session service models.
//!
//! Request schemas are deliberately lenient (every field optional) so that
//! handlers can answer missing fields with 400 instead of a framework 422.
//! Each request type has a `validate` step that yields the typed
//! parameters the services work with.

use chrono::{DateTime, Utc};
use common::types::{AttendeeInfo, MediaPlacement, MeetingFeatures, MeetingInfo};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum meeting title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Maximum attendee display name length, in characters.
pub const MAX_ATTENDEE_NAME_LENGTH: usize = 256;

// ============================================================================
// Registry records
// ============================================================================

/// A meeting known to the registry.
///
/// Created on the first successful join for a title and never mutated
/// afterwards; teardown removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRecord {
    /// Registry key chosen by the caller.
    pub title: String,

    /// Opaque meeting handle issued by the provider.
    pub provider_meeting_id: String,

    /// Title truncated to the provider's external id limit.
    pub external_meeting_id: String,

    pub media_region: String,

    pub media_placement: MediaPlacement,

    pub features: MeetingFeatures,

    pub created_at: DateTime<Utc>,
}

impl MeetingRecord {
    /// Wire representation for the client SDK.
    pub fn to_info(&self) -> MeetingInfo {
        MeetingInfo {
            meeting_id: self.provider_meeting_id.clone(),
            external_meeting_id: Some(self.external_meeting_id.clone()),
            media_region: self.media_region.clone(),
            media_placement: self.media_placement.clone(),
            meeting_features: self.features.audio.as_ref().map(|_| self.features.clone()),
        }
    }
}

/// An attendee minted for a meeting.
#[derive(Clone, PartialEq, Eq)]
pub struct AttendeeRecord {
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: String,
    pub display_name: String,
    /// Parent meeting title.
    pub title: String,
}

impl AttendeeRecord {
    /// Wire representation for the client SDK.
    pub fn to_info(&self) -> AttendeeInfo {
        AttendeeInfo {
            attendee_id: self.attendee_id.clone(),
            external_user_id: self.external_user_id.clone(),
            join_token: self.join_token.clone(),
            name: Some(self.display_name.clone()),
        }
    }
}

/// Custom Debug implementation that redacts the join token.
impl fmt::Debug for AttendeeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendeeRecord")
            .field("attendee_id", &self.attendee_id)
            .field("external_user_id", &self.external_user_id)
            .field("join_token", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("title", &self.title)
            .finish()
    }
}

// ============================================================================
// Join
// ============================================================================

/// Body of `POST /join`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub attendee_name: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Echo reduction flag. Browsers send either `true` or `"true"`.
    #[serde(rename = "ns_es", default, deserialize_with = "deserialize_flag")]
    pub echo_reduction: bool,
}

/// Validated join parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub title: String,
    pub attendee_name: String,
    pub region: Option<String>,
    pub echo_reduction: bool,
}

impl JoinMeetingRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message if a required field is missing or
    /// a field is malformed.
    pub fn validate(self) -> Result<JoinParams, &'static str> {
        let title = non_blank(self.title);
        let attendee_name = non_blank(self.attendee_name);

        let (Some(title), Some(attendee_name)) = (title, attendee_name) else {
            return Err("Missing required fields: title and attendeeName");
        };

        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err("Meeting title must be at most 256 characters");
        }

        if attendee_name.chars().count() > MAX_ATTENDEE_NAME_LENGTH {
            return Err("Attendee name must be at most 256 characters");
        }

        let region = match self.region {
            Some(region) if region.is_empty() => None,
            Some(region) => {
                if !is_valid_region(&region) {
                    return Err("Region must contain only letters, digits and hyphens");
                }
                Some(region)
            }
            None => None,
        };

        Ok(JoinParams {
            title,
            attendee_name,
            region,
            echo_reduction: self.echo_reduction,
        })
    }
}

/// A media region looks like `us-east-1`.
fn is_valid_region(region: &str) -> bool {
    region.len() <= 32 && region.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ============================================================================
// End
// ============================================================================

/// Body of `POST /end`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,
}

impl EndMeetingRequest {
    /// Validate the request, returning the meeting title.
    pub fn validate(self) -> Result<String, &'static str> {
        non_blank(self.title).ok_or("Missing required field: title")
    }
}

// ============================================================================
// Attendee lookup
// ============================================================================

/// Query string of `GET /attendee`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendeeQuery {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(rename = "attendeeId", default)]
    pub attendee_id: Option<String>,
}

impl AttendeeQuery {
    /// Validate the query, returning `(title, attendee_id)`.
    pub fn validate(self) -> Result<(String, String), &'static str> {
        match (non_blank(self.title), non_blank(self.attendee_id)) {
            (Some(title), Some(attendee_id)) => Ok((title, attendee_id)),
            _ => Err("Missing required query parameters: title and attendeeId"),
        }
    }
}

// ============================================================================
// Operational responses
// ============================================================================

/// Readiness response returned by `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Meeting store status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<&'static str>,

    /// Live meetings in the registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_meetings: Option<usize>,

    /// Generic error message when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accept `true`, `false`, `"true"` or `null` for boolean request flags.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(flag)) => flag,
        Some(serde_json::Value::String(text)) => text == "true",
        _ => false,
    })
}
