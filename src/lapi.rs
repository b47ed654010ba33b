//! CrowdSec Local API access.
//!
//! - `transport`: thin JSON-over-HTTP wrapper around a shared `reqwest::Client`.
//! - `retry`: injectable backoff policy and the bounded retry loop.
//! - `client`: the authenticated, retrying [`UpstreamClient`].

pub mod client;
pub mod retry;
pub mod transport;

pub use client::UpstreamClient;
pub use retry::{Backoff, RetryPolicy};
pub use transport::{LapiTransport, RawResponse};
