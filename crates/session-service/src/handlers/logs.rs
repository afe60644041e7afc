//! Client log sink.
//!
//! Browser clients batch their console logs to `POST /logs`. The service
//! writes them to its own log stream and does nothing else with them.

use axum::{body::Bytes, Json};
use common::types::MessageResponse;
use tracing::{info, instrument};

/// Largest log payload echoed into the service log, in bytes.
const MAX_LOGGED_BYTES: usize = 16 * 1024;

/// Handler for POST /logs
///
/// Always answers 200 with `{"message": "Logs received successfully"}`.
#[instrument(skip_all, name = "session.logs.ingest", fields(bytes = body.len()))]
pub async fn ingest_logs(body: Bytes) -> Json<MessageResponse> {
    let truncated = body.len() > MAX_LOGGED_BYTES;
    let shown: &[u8] = body.get(..MAX_LOGGED_BYTES).unwrap_or(body.as_ref());

    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) if !truncated => {
            info!(target: "session.client_logs", logs = %value, "Client logs received");
        }
        _ => {
            info!(
                target: "session.client_logs",
                logs = %String::from_utf8_lossy(shown),
                truncated,
                "Client logs received"
            );
        }
    }

    Json(MessageResponse {
        message: "Logs received successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_json_logs() {
        let Json(response) = ingest_logs(Bytes::from_static(br#"[{"level":"info"}]"#)).await;
        assert_eq!(response.message, "Logs received successfully");
    }

    #[tokio::test]
    async fn test_ingest_non_json_logs() {
        let Json(response) = ingest_logs(Bytes::from_static(b"plain text line")).await;
        assert_eq!(response.message, "Logs received successfully");
    }

    #[tokio::test]
    async fn test_ingest_oversized_logs() {
        let body = Bytes::from(vec![b'x'; MAX_LOGGED_BYTES * 2]);
        let Json(response) = ingest_logs(body).await;
        assert_eq!(response.message, "Logs received successfully");
    }
}
