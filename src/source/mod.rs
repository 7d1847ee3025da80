//! Remote event type sources.
//!
//! This module defines the [`EventTypeSource`] trait and the validated
//! [`RawEventType`] record shape. The HTTP implementation lives in [`http`].
//!
//! A source only fetches. It hands back the undecoded JSON records so that
//! validation happens in one place, the
//! [`EntityMapper`](crate::mapper::EntityMapper), and a malformed record fails
//! the cycle as a mapping error rather than a transport error.

mod http;
mod raw;

pub use http::HttpEventTypeSource;
pub use raw::{RawEventType, RawReference};

use async_trait::async_trait;

use crate::error::Result;

/// Something that can list the event types available at a base URL.
///
/// Called once per sync cycle from a scheduled task, so implementations must
/// be [`Send`] and [`Sync`]. No retries: a failed fetch simply waits for the
/// next tick.
#[async_trait]
pub trait EventTypeSource: Send + Sync {
    /// Fetch the raw records served at `base_url`.
    ///
    /// Fails with [`ProviderError::RemoteFetch`](crate::error::ProviderError::RemoteFetch)
    /// on transport errors, non-success statuses, or a body that is not a
    /// JSON array.
    async fn fetch(&self, base_url: &str) -> Result<Vec<serde_json::Value>>;
}
