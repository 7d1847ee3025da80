//! The entity provider: one configured polling target, end to end.
//!
//! A [`SyncProvider`] starts disconnected. The host hands it a catalog
//! connection through [`SyncProvider::connect`], which also registers the
//! provider's [`ScheduledSyncTask`] with its task runner. From then on every
//! tick runs [`SyncProvider::run`]: fetch, map, and submit one full mutation
//! under the provider's own location key.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::info;

use crate::config::{read_provider_configs, ProviderConfig, ProviderKind};
use crate::connection::{
    DeferredEntity, EntityProvider, EntityProviderConnection, EntityProviderMutation,
};
use crate::error::{ProviderError, Result};
use crate::mapper::EntityMapper;
use crate::scheduler::{Scheduler, TaskRunner};
use crate::source::{EventTypeSource, HttpEventTypeSource};
use crate::task::ScheduledSyncTask;

/// Collaborators for [`SyncProvider::from_config`].
///
/// At least one of `schedule` and `scheduler` is required.
#[derive(Default)]
pub struct ProviderOptions {
    /// Runner used by every provider that has no schedule of its own.
    pub schedule: Option<Arc<dyn TaskRunner>>,
    /// Creates a runner for each provider that configures a schedule.
    pub scheduler: Option<Arc<dyn Scheduler>>,
    /// Where event types come from. Defaults to [`HttpEventTypeSource`].
    pub source: Option<Arc<dyn EventTypeSource>>,
}

pub struct SyncProvider {
    kind: ProviderKind,
    id: String,
    base_url: String,
    mapper: EntityMapper,
    source: Arc<dyn EventTypeSource>,
    task_runner: Arc<dyn TaskRunner>,
    connection: OnceLock<Arc<dyn EntityProviderConnection>>,
}

impl SyncProvider {
    pub fn new(
        config: ProviderConfig,
        task_runner: Arc<dyn TaskRunner>,
        source: Arc<dyn EventTypeSource>,
    ) -> Self {
        Self {
            mapper: EntityMapper::new(&config.id, &config.base_url),
            kind: config.kind,
            id: config.id,
            base_url: config.base_url,
            source,
            task_runner,
            connection: OnceLock::new(),
        }
    }

    /// Build one provider per entry under `catalog.providers.knativeEventType`
    /// and `catalog.providers.knativeEventMesh`.
    ///
    /// A provider with its own `schedule` gets a runner from the scheduler;
    /// the others share `options.schedule`. Every configuration problem is
    /// reported here, before anything is registered with a scheduler.
    pub fn from_config(root: &toml::Value, options: ProviderOptions) -> Result<Vec<Arc<Self>>> {
        if options.schedule.is_none() && options.scheduler.is_none() {
            return Err(ProviderError::config(
                "either a default schedule or a scheduler must be provided",
            ));
        }

        let configs = read_provider_configs(root)?;
        info!(
            count = configs.len(),
            ids = %configs
                .iter()
                .map(|c| format!("{}.{}", c.kind.section(), c.id))
                .collect::<Vec<_>>()
                .join(", "),
            "found knative provider configs"
        );

        let source: Arc<dyn EventTypeSource> = match options.source {
            Some(source) => source,
            None => Arc::new(HttpEventTypeSource::new()?),
        };

        configs
            .into_iter()
            .map(|config| {
                let task_runner = match (&config.schedule, &options.scheduler, &options.schedule) {
                    (Some(schedule), Some(scheduler), _) => {
                        scheduler.create_recurring_task(*schedule)?
                    }
                    (_, _, Some(default)) => Arc::clone(default),
                    _ => {
                        return Err(ProviderError::config(format!(
                            "no schedule provided via code or config for provider {}",
                            config.id
                        )))
                    }
                };
                Ok(Arc::new(Self::new(config, task_runner, Arc::clone(&source))))
            })
            .collect()
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<kind prefix>:<id>`, e.g. `knative-event-type-provider:dev`; doubles
    /// as the location key.
    pub fn provider_name(&self) -> String {
        format!("{}:{}", self.kind.name_prefix(), self.id)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.get().is_some()
    }

    /// Store the catalog connection without scheduling anything.
    pub(crate) fn set_connection(&self, connection: Arc<dyn EntityProviderConnection>) -> Result<()> {
        self.connection
            .set(connection)
            .map_err(|_| ProviderError::AlreadyConnected)
    }

    /// Store the connection and register the recurring sync task.
    ///
    /// Depending on the runner, the first cycle may run before this returns.
    pub async fn connect(self: Arc<Self>, connection: Arc<dyn EntityProviderConnection>) -> Result<()> {
        self.set_connection(connection)?;
        info!(provider = %self.provider_name(), base_url = %self.base_url, "provider connected");

        let task = Arc::new(ScheduledSyncTask::new(Arc::clone(&self)));
        self.task_runner.run(task.into_invocation()).await
    }

    /// Run one full sync cycle and return the number of entities submitted.
    ///
    /// Nothing is submitted unless fetching and mapping both succeed.
    pub async fn run(&self) -> Result<usize> {
        let connection = self.connection.get().ok_or(ProviderError::NotInitialized)?;

        let records = self.source.fetch(&self.base_url).await?;
        let entities = self.mapper.map(records)?;

        let location_key = self.provider_name();
        let count = entities.len();
        let mutation = EntityProviderMutation::Full {
            entities: entities
                .into_iter()
                .map(|entity| DeferredEntity {
                    entity,
                    location_key: location_key.clone(),
                })
                .collect(),
        };

        connection
            .apply_mutation(mutation)
            .await
            .map_err(ProviderError::Submission)?;
        Ok(count)
    }
}

impl fmt::Debug for SyncProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncProvider")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntityProvider for SyncProvider {
    fn provider_name(&self) -> String {
        SyncProvider::provider_name(self)
    }

    async fn connect(self: Arc<Self>, connection: Arc<dyn EntityProviderConnection>) -> Result<()> {
        SyncProvider::connect(self, connection).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
