//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace reaches for the
//! same types. Use them for provider API keys and any credential read from
//! the environment.
//!
//! `SecretString` implements `Debug` with redaction, so deriving `Debug` on a
//! config struct that holds one is safe to log.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ProviderCredentials {
//!     key_id: String,
//!     api_key: SecretString,
//! }
//!
//! let creds = ProviderCredentials {
//!     key_id: "demo".to_string(),
//!     api_key: SecretString::from("sk-live-123"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("sk-live-123"));
//! assert_eq!(creds.api_key.expose_secret(), "sk-live-123");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
