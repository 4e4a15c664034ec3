//! HTTP request executors.
//!
//! The [`Transport`] trait is the only way the bucket reaches the network.
//! Implementations: [`http::HttpTransport`] (a real HTTP client) and
//! [`memory::MemoryTransport`] (an in-process S3-compatible store).
//!
//! Timeouts, retries and connection handling belong to the transport; the
//! bucket issues exactly one `execute` per request and never retries.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

pub mod http;
pub mod memory;

/// Async request/response contract.
///
/// An `Err` means no response was obtained at all.  Any response, whatever
/// its status, is returned as `Ok`.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: ::http::Request<Bytes>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<::http::Response<Bytes>>> + Send + '_>>;
}
