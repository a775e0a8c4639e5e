//! Remote chat endpoint integrations for parley
//!
//! The remote service is a black box that takes one user message and
//! answers with one reply. [`ChatEndpoint`] is that contract and
//! [`HttpEndpoint`] speaks it over HTTP.

pub mod base;
pub mod http;

pub use base::{ChatEndpoint, EndpointError, EndpointResult};
pub use http::HttpEndpoint;
