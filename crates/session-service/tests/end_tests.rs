//! `POST /end` integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use session_test_utils::{MockProviderClient, TestSessionServer};

/// Alice and Bob join "standup", Alice ends it: one provider delete, both
/// attendees gone, and a later join starts a fresh meeting.
#[tokio::test]
async fn test_standup_lifecycle() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

    let alice: serde_json::Value = server.join("standup", "Alice").await?.json().await?;
    let bob: serde_json::Value = server.join("standup", "Bob").await?.json().await?;
    let first_meeting = alice["JoinInfo"]["Meeting"]["MeetingId"].clone();
    assert_eq!(first_meeting, bob["JoinInfo"]["Meeting"]["MeetingId"]);

    let response = server.end("standup").await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["message"], "Meeting ended successfully");

    assert_eq!(server.provider().delete_meeting_calls(), 1);
    assert_eq!(
        server.provider().deleted_meetings().await,
        vec![first_meeting.as_str().unwrap_or_default().to_string()]
    );

    let bob_id = bob["JoinInfo"]["Attendee"]["AttendeeId"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let lookup = reqwest::Client::new()
        .get(format!("{}/attendee", server.url()))
        .query(&[("title", "standup"), ("attendeeId", bob_id.as_str())])
        .send()
        .await?;
    assert_eq!(lookup.status(), 404);

    let rejoin: serde_json::Value = server.join("standup", "Alice").await?.json().await?;
    assert_ne!(rejoin["JoinInfo"]["Meeting"]["MeetingId"], first_meeting);
    assert_eq!(server.provider().create_meeting_calls(), 2);

    Ok(())
}

#[tokio::test]
async fn test_end_twice_returns_404() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;
    server.join("standup", "Alice").await?;

    assert_eq!(server.end("standup").await?.status(), 200);

    let response = server.end("standup").await?;
    assert_eq!(response.status(), 404);
    let error: serde_json::Value = response.json().await?;
    assert_eq!(error["error"]["code"], "NOT_FOUND");
    assert_eq!(server.provider().delete_meeting_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_end_unknown_meeting_returns_404() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

    assert_eq!(server.end("ghost").await?.status(), 404);
    assert_eq!(server.provider().delete_meeting_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_end_missing_title_returns_400() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/end", server.url()))
        .json(&serde_json::json!({}))
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let error: serde_json::Value = response.json().await?;
    assert_eq!(error["error"]["message"], "Missing required field: title");

    Ok(())
}

#[tokio::test]
async fn test_provider_delete_failure_keeps_meeting() -> Result<(), anyhow::Error> {
    let server =
        TestSessionServer::spawn(MockProviderClient::failing_delete_meeting("AccessDenied"))
            .await?;
    let alice: serde_json::Value = server.join("standup", "Alice").await?.json().await?;

    let response = server.end("standup").await?;
    assert_eq!(response.status(), 403);
    let error: serde_json::Value = response.json().await?;
    assert_eq!(error["error"]["message"], "AccessDenied");

    let again: serde_json::Value = server.join("standup", "Bob").await?.json().await?;
    assert_eq!(
        again["JoinInfo"]["Meeting"]["MeetingId"],
        alice["JoinInfo"]["Meeting"]["MeetingId"]
    );
    assert_eq!(server.provider().create_meeting_calls(), 1);

    Ok(())
}
