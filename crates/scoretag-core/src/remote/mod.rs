//! HTTP adapters for remote collaborators.
//!
//! - [`HttpClassifier`]: the external classifier
//! - [`HttpTermGenerator`]: the generative fallback for unresolved labels
//! - [`HttpRemoteStore`]: a shared store behind an HTTP API
//!
//! Retry and timeout helpers used by the pipeline live in [`retry`].

mod client;
pub mod retry;
mod services;
mod store;

#[cfg(test)]
mod test_server;

pub use client::HttpClient;
pub use retry::{retry_async, with_timeout, RetryPolicy};
pub use services::{HttpClassifier, HttpTermGenerator};
pub use store::HttpRemoteStore;
