//! Core types for parley
//!
//! This crate owns the chat session model, the session store and its
//! storage adapters, the view projection handed to renderers, and the
//! configuration and logging shared by the other parley crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod storage;
pub mod utils;
pub mod view;

pub use error::{Error, Result};
