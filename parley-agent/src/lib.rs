//! Conversation handling for parley
//!
//! [`ConversationController`] drives one exchange with the remote endpoint
//! at a time. [`ChatApp`] wires it to the session store and the view
//! projection, and is the only surface a renderer talks to.

pub mod app;
pub mod controller;

pub use app::ChatApp;
pub use controller::{
    ControllerState, ConversationController, ConversationError, PendingReply, SendOutcome,
    SharedStore, CONNECTION_ERROR_REPLY, FALLBACK_REPLY,
};
