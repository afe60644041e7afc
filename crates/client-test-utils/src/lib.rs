//! # Client Test Utilities
//!
//! Fakes for the meeting client's capture seams, so coordinator tests run
//! without a browser.
//!
//! ## Modules
//!
//! - `ledger` - Shared record of tracks opened and stopped
//! - `fake_platform` - Scriptable `MediaPlatform`
//! - `fake_device_manager` - Scriptable `DeviceManager`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use client_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let platform = FakePlatform::builder().with_devices(default_devices()).build();
//!     let manager = FakeDeviceManager::builder(platform.ledger())
//!         .with_devices(default_devices())
//!         .build();
//!
//!     // Spawn a coordinator with Arc::new(platform) and Some(Arc::new(manager))...
//!
//!     assert_eq!(platform.ledger().live_tracks(), 0);
//! }
//! ```

pub mod fake_device_manager;
pub mod fake_platform;
pub mod ledger;

pub use fake_device_manager::*;
pub use fake_platform::*;
pub use ledger::*;

use meeting_client::platform::{DeviceInfo, DeviceKind};

/// Two cameras, two microphones and one speaker.
pub fn default_devices() -> Vec<DeviceInfo> {
    vec![
        DeviceInfo::new("cam-1", DeviceKind::VideoInput, "Integrated Camera"),
        DeviceInfo::new("cam-2", DeviceKind::VideoInput, "USB Camera"),
        DeviceInfo::new("mic-1", DeviceKind::AudioInput, "Built-in Microphone"),
        DeviceInfo::new("mic-2", DeviceKind::AudioInput, "Headset Microphone"),
        DeviceInfo::new("spk-1", DeviceKind::AudioOutput, "Built-in Speakers"),
    ]
}
