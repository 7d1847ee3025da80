//! One sync cycle per scheduler tick, with failure isolation.
//!
//! Whatever happens inside a cycle (a fetch error, a bad record, a rejected
//! mutation, even a panic) ends at [`ScheduledSyncTask::execute`]. The failure
//! is logged and the task stays ready for the next tick.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use crate::error::ProviderError;
use crate::provider::SyncProvider;
use crate::scheduler::TaskInvocation;

/// The recurring unit of work registered for a [`SyncProvider`].
pub struct ScheduledSyncTask {
    provider: Arc<SyncProvider>,
}

impl ScheduledSyncTask {
    pub fn new(provider: Arc<SyncProvider>) -> Self {
        Self { provider }
    }

    /// Task id used with the scheduler: `<provider name>:run`.
    pub fn id(&self) -> String {
        format!("{}:run", self.provider.provider_name())
    }

    /// Run one cycle. Never fails and never panics; outcomes go to the log.
    pub async fn execute(&self) {
        let outcome = AssertUnwindSafe(self.provider.run()).catch_unwind().await;
        match outcome {
            Ok(Ok(count)) => info!(
                provider = %self.provider.provider_name(),
                entities = count,
                "applied full mutation"
            ),
            Ok(Err(err)) => self.log_failure(&err),
            Err(panic) => error!(
                provider = %self.provider.provider_name(),
                base_url = %self.provider.base_url(),
                name = "Panic",
                "sync cycle panicked: {}",
                panic_message(&*panic)
            ),
        }
    }

    /// Wrap the task as a [`TaskInvocation`] for a
    /// [`TaskRunner`](crate::scheduler::TaskRunner).
    pub fn into_invocation(self: Arc<Self>) -> TaskInvocation {
        let id = self.id();
        TaskInvocation::new(
            id,
            Arc::new(move || {
                let task = Arc::clone(&self);
                async move { task.execute().await }.boxed()
            }),
        )
    }

    // Only the error's kind, message, cause chain, and status are logged.
    // Response bodies never reach a ProviderError in the first place.
    fn log_failure(&self, err: &ProviderError) {
        let provider = self.provider.provider_name();
        let base_url = self.provider.base_url();
        match err.status() {
            Some(status) => error!(
                %provider,
                %base_url,
                name = err.name(),
                stack = %err.stack(),
                status,
                "sync cycle failed: {err}"
            ),
            None => error!(
                %provider,
                %base_url,
                name = err.name(),
                stack = %err.stack(),
                "sync cycle failed: {err}"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
