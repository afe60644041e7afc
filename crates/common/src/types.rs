//! Wire schemas for the session HTTP API.
//!
//! Response objects use the provider's PascalCase field names because the
//! conferencing SDK on the client consumes `Meeting` and `Attendee` as-is.
//! Request bodies use camelCase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media region used when a join request does not name one.
pub const DEFAULT_MEDIA_REGION: &str = "us-east-1";

/// Longest external meeting id the provider accepts.
pub const MAX_EXTERNAL_MEETING_ID_LENGTH: usize = 64;

/// Feature value enabling provider-side echo reduction.
pub const ECHO_REDUCTION_AVAILABLE: &str = "AVAILABLE";

/// Derive the provider's external meeting id from a meeting title.
///
/// Titles longer than [`MAX_EXTERNAL_MEETING_ID_LENGTH`] characters are
/// truncated; the full title stays the registry key.
#[must_use]
pub fn external_meeting_id(title: &str) -> String {
    title.chars().take(MAX_EXTERNAL_MEETING_ID_LENGTH).collect()
}

/// Provider endpoints the client SDK connects to for a meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaPlacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_host_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_fallback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signaling_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_control_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_viewing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_sharing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ingestion_url: Option<String>,
}

/// Audio feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AudioFeatures {
    pub echo_reduction: String,
}

/// Optional meeting features requested at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeetingFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioFeatures>,
}

impl MeetingFeatures {
    /// Features with echo reduction enabled.
    #[must_use]
    pub fn with_echo_reduction() -> Self {
        Self {
            audio: Some(AudioFeatures {
                echo_reduction: ECHO_REDUCTION_AVAILABLE.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn echo_reduction(&self) -> bool {
        self.audio
            .as_ref()
            .is_some_and(|a| a.echo_reduction == ECHO_REDUCTION_AVAILABLE)
    }
}

/// The `Meeting` object handed to the client SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeetingInfo {
    pub meeting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_meeting_id: Option<String>,
    pub media_region: String,
    #[serde(default)]
    pub media_placement: MediaPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_features: Option<MeetingFeatures>,
}

/// The `Attendee` object handed to the client SDK.
///
/// Debug output redacts the join token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttendeeInfo {
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Debug for AttendeeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendeeInfo")
            .field("attendee_id", &self.attendee_id)
            .field("external_user_id", &self.external_user_id)
            .field("join_token", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Session credentials returned by a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JoinInfo {
    pub title: String,
    pub meeting: MeetingInfo,
    pub attendee: AttendeeInfo,
}

/// Body of a `201 Created` join response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "JoinInfo")]
    pub join_info: JoinInfo,
}

/// Join request as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub title: String,
    pub attendee_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "ns_es", default, skip_serializing_if = "std::ops::Not::not")]
    pub echo_reduction: bool,
}

/// End request as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndRequest {
    pub title: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
