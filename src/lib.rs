//! knative-entity-provider — scheduled entity providers for a software catalog.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐  ProviderConfig  ┌─────────────┐  register  ┌──────────────┐
//! │ config.rs │ ───────────────► │ provider.rs │ ─────────► │ scheduler.rs │
//! └───────────┘                  └─────────────┘            └──────────────┘
//!                                       ▲ run()                    │ tick
//!                                       └───────── task.rs ◄───────┘
//!
//!   run():  source/ (fetch) ──► mapper.rs (dedup + map) ──► connection.rs (full mutation)
//! ```
//!
//! * **`config`** — reads `catalog.providers.knativeEventType` and
//!   `catalog.providers.knativeEventMesh` from the host configuration into
//!   [`ProviderConfig`] values.
//! * **`source`** — the [`EventTypeSource`] trait and its HTTP implementation.
//! * **`mapper`** — turns raw event types into [`ApiEntity`] records.
//! * **`connection`** — the catalog-facing traits and mutation types.
//! * **`scheduler`** — recurring execution, with a tokio implementation.
//! * **`task`** — one isolated sync cycle per tick.
//! * **`provider`** — wires all of the above for one polling target.

pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod provider;
pub mod scheduler;
pub mod source;
pub mod stdout;
pub mod task;

#[cfg(test)]
mod testing;

pub use config::{read_provider_configs, ProviderConfig, ProviderKind, ScheduleDefinition};
pub use connection::{
    DeferredEntity, EntityProvider, EntityProviderConnection, EntityProviderMutation,
};
pub use entity::{ApiEntity, EntityRelation};
pub use error::{ProviderError, Result};
pub use mapper::EntityMapper;
pub use provider::{ProviderOptions, SyncProvider};
pub use scheduler::{ImmediateTaskRunner, Scheduler, TaskInvocation, TaskRunner, TokioScheduler};
pub use source::{EventTypeSource, HttpEventTypeSource, RawEventType};
pub use task::ScheduledSyncTask;
