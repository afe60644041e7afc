//! # Session Test Utilities
//!
//! Shared test utilities for the session service.
//!
//! This crate provides:
//! - Server test harness (`TestSessionServer` for E2E tests)
//! - Request helpers for the join and end endpoints
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;
//!
//!     let response = server.join("standup", "Alice").await?;
//!
//!     assert_eq!(response.status(), 201);
//!     assert_eq!(server.provider().create_meeting_calls(), 1);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
pub use session_service::services::provider_client::mock::MockProviderClient;
