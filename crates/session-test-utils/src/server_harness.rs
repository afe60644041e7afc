//! Test server harness for E2E testing
//!
//! Provides `TestSessionServer` for spawning real session service instances
//! backed by an in-memory store and a mock provider.

use metrics_exporter_prometheus::PrometheusBuilder;
use session_service::config::Config;
use session_service::repositories::InMemoryMeetingStore;
use session_service::routes::{self, AppState};
use session_service::services::provider_client::mock::MockProviderClient;
use session_service::services::ProviderClient;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the session service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSessionServer {
    addr: SocketAddr,
    config: Config,
    state: Arc<AppState>,
    provider: Arc<MockProviderClient>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestSessionServer {
    /// Spawn a new test server instance with its own meeting store.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// # Arguments
    /// * `provider` - Mock provider the service talks to; counters stay
    ///   readable through [`TestSessionServer::provider`]
    pub async fn spawn(provider: MockProviderClient) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "PROVIDER_API_URL".to_string(),
                "http://localhost:9100".to_string(),
            ),
            ("PROVIDER_API_KEY".to_string(), "test-api-key".to_string()),
            ("DEFAULT_MEDIA_REGION".to_string(), "us-east-1".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let provider = Arc::new(provider);
        let state = Arc::new(AppState::new(
            config.clone(),
            Arc::new(InMemoryMeetingStore::new()),
            Arc::clone(&provider) as Arc<dyn ProviderClient>,
        ));

        // A global recorder can only be installed once per process, and test
        // binaries spawn many servers. Build an uninstalled recorder instead.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            state,
            provider,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared application state, for inspecting the registry directly.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The mock provider behind this server.
    pub fn provider(&self) -> &MockProviderClient {
        &self.provider
    }

    /// `POST /join` with a title and attendee name.
    pub async fn join(
        &self,
        title: &str,
        attendee_name: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        self.join_with(serde_json::json!({ "title": title, "attendeeName": attendee_name }))
            .await
    }

    /// `POST /join` with an arbitrary JSON body.
    pub async fn join_with(
        &self,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/join", self.url()))
            .json(&body)
            .send()
            .await?)
    }

    /// `POST /end` for a title.
    pub async fn end(&self, title: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/end", self.url()))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?)
    }
}

impl Drop for TestSessionServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_config_access() -> Result<(), anyhow::Error> {
        let server = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

        assert_eq!(server.config().default_media_region, "us-east-1");
        assert_eq!(server.config().bind_address, "127.0.0.1:0");

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_have_isolated_state() -> Result<(), anyhow::Error> {
        let server1 = TestSessionServer::spawn(MockProviderClient::accepting()).await?;
        let server2 = TestSessionServer::spawn(MockProviderClient::accepting()).await?;

        assert_ne!(server1.addr(), server2.addr());

        assert_eq!(server1.join("standup", "Alice").await?.status(), 201);

        assert_eq!(server1.provider().create_meeting_calls(), 1);
        assert_eq!(server2.provider().create_meeting_calls(), 0);
        assert_eq!(server2.state().registry.meeting_count().await?, 0);

        Ok(())
    }
}
