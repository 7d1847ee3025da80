//! The narrow interface between a provider and the catalog.
//!
//! The catalog engine is owned by the host. All a provider ever needs from it
//! is a way to submit mutations, which is what [`EntityProviderConnection`]
//! captures.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::entity::ApiEntity;
use crate::error::Result;

/// An entity plus the location key that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredEntity {
    pub entity: ApiEntity,
    pub location_key: String,
}

/// A change submitted to the catalog.
///
/// `Full` declares the complete current set of entities for the location keys
/// it contains. The catalog deletes anything it previously received under
/// those keys that is missing from the new set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityProviderMutation {
    Full { entities: Vec<DeferredEntity> },
}

impl EntityProviderMutation {
    pub fn entities(&self) -> &[DeferredEntity] {
        match self {
            EntityProviderMutation::Full { entities } => entities,
        }
    }
}

/// Handle the catalog gives a provider when it is wired in.
#[async_trait]
pub trait EntityProviderConnection: Send + Sync {
    async fn apply_mutation(&self, mutation: EntityProviderMutation) -> anyhow::Result<()>;
}

/// What the host sees of a provider.
#[async_trait]
pub trait EntityProvider: Send + Sync {
    /// Unique name of the provider; also the location key of its entities.
    fn provider_name(&self) -> String;

    /// Hand the provider its catalog connection. Called once by the host.
    async fn connect(self: Arc<Self>, connection: Arc<dyn EntityProviderConnection>) -> Result<()>;
}
