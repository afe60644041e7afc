//! Repository layer for the session service.
//!
//! Storage sits behind the `MeetingStore` trait so the registry can run on
//! the in-memory store or a persistent key-value backend.

pub mod meetings;

pub use meetings::{InMemoryMeetingStore, MeetingStore};
