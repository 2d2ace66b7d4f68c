//! HTTP client for the model store API.

pub mod client;
pub mod error;
