//! Chat sessions
//!
//! Sessions are kept in insertion order and persisted as a single JSON
//! object mapping session ids to sessions.

pub mod manager;
pub mod store;

pub use manager::{SessionStore, SessionSummary, STORAGE_KEY};
pub use store::{Message, Role, Session, SessionId, DEFAULT_TITLE};
