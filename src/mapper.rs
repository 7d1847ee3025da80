//! Raw event types → catalog entities.
//!
//! Mapping is pure and all-or-nothing. The result feeds a full mutation, so a
//! batch that silently skipped a bad record would make the catalog delete the
//! entity that record used to produce. Any invalid record fails the batch.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::entity::{
    entity_name, ApiEntity, ApiSpec, EntityLink, EntityMetadata, EntityRelation,
    ANNOTATION_LOCATION, ANNOTATION_ORIGIN_LOCATION, API_KIND, API_VERSION, EMPTY_DEFINITION,
    EVENT_MESH_SYSTEM, EVENT_TYPE_API_TYPE, EVENT_TYPE_OWNER, RELATION_API_PROVIDED_BY,
};
use crate::error::{ProviderError, Result};
use crate::source::{RawEventType, RawReference};

/// Scheme prefix of the provenance location annotations.
const LOCATION_SCHEME: &str = "url";
/// Namespace used in provenance locations when a record has none.
const DEFAULT_NAMESPACE: &str = "default";
/// Kind assumed for a producer reference that does not name one.
const DEFAULT_PRODUCER_KIND: &str = "broker";

const SCHEMA_LINK_TITLE: &str = "View external schema";
const SCHEMA_LINK_ICON: &str = "code";

/// Maps the records of one provider into entities.
#[derive(Debug, Clone)]
pub struct EntityMapper {
    provider_id: String,
    base_url: String,
}

impl EntityMapper {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
        }
    }

    /// Validate, de-duplicate, and convert a fetched batch.
    ///
    /// Records that yield the same entity name collapse into one entity: the
    /// last record wins, but the entity keeps the position where the name
    /// first appeared. Identical types always share a name; distinct types
    /// can too, since name derivation replaces and truncates characters.
    pub fn map(&self, records: Vec<serde_json::Value>) -> Result<Vec<ApiEntity>> {
        let mut by_name: IndexMap<String, RawEventType> = IndexMap::with_capacity(records.len());
        for (index, value) in records.into_iter().enumerate() {
            let record = RawEventType::from_value(index, value)?;
            let name = entity_name(&record.event_type);
            if name.is_empty() {
                return Err(ProviderError::Mapping(format!(
                    "record {index}: type {:?} does not yield a valid entity name",
                    record.event_type
                )));
            }
            // `insert` keeps the original slot for an existing key.
            if let Some(replaced) = by_name.insert(name, record) {
                debug!(
                    provider = %self.provider_id,
                    replaced_type = %replaced.event_type,
                    "later event type replaces an earlier one with the same entity name"
                );
            }
        }

        Ok(by_name
            .into_iter()
            .map(|(name, record)| self.build_entity(name, record))
            .collect())
    }

    fn build_entity(&self, name: String, record: RawEventType) -> ApiEntity {
        let location = self.location(
            record.namespace.as_deref(),
            record.name.as_deref().unwrap_or(&name),
        );
        let mut annotations = record.annotations.unwrap_or_default();
        annotations.insert(ANNOTATION_LOCATION.to_string(), location.clone());
        annotations.insert(ANNOTATION_ORIGIN_LOCATION.to_string(), location);

        let relations = record
            .reference
            .as_ref()
            .and_then(|r| producer_ref(r, record.namespace.as_deref()))
            .map(|target_ref| EntityRelation {
                relation_type: RELATION_API_PROVIDED_BY,
                target_ref,
            })
            .into_iter()
            .collect();

        let links = record
            .schema_url
            .map(|url| EntityLink {
                url,
                title: SCHEMA_LINK_TITLE.to_string(),
                icon: SCHEMA_LINK_ICON.to_string(),
            })
            .into_iter()
            .collect();

        ApiEntity {
            api_version: API_VERSION,
            kind: API_KIND,
            metadata: EntityMetadata {
                name,
                namespace: record.namespace,
                title: record.event_type,
                description: record.description,
                labels: record.labels.unwrap_or_else(BTreeMap::new),
                annotations,
                links,
            },
            spec: ApiSpec {
                api_type: EVENT_TYPE_API_TYPE,
                lifecycle: self.provider_id.clone(),
                system: EVENT_MESH_SYSTEM,
                owner: EVENT_TYPE_OWNER,
                definition: record
                    .schema_data
                    .unwrap_or_else(|| EMPTY_DEFINITION.to_string()),
            },
            relations,
        }
    }

    /// `url:<baseUrl>/eventtype/<namespace>/<name>`
    fn location(&self, namespace: Option<&str>, name: &str) -> String {
        format!(
            "{LOCATION_SCHEME}:{}/eventtype/{}/{name}",
            self.base_url.trim_end_matches('/'),
            namespace.unwrap_or(DEFAULT_NAMESPACE),
        )
    }
}

/// `<kind>:<namespace>/<name>` of the resource producing an event type, or
/// `None` when the reference names no resource.
fn producer_ref(reference: &RawReference, record_namespace: Option<&str>) -> Option<String> {
    let name = reference.name.as_deref().filter(|n| !n.is_empty())?;
    let kind = reference
        .kind
        .as_deref()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_PRODUCER_KIND.to_string());
    let namespace = reference
        .namespace
        .as_deref()
        .or(record_namespace)
        .unwrap_or(DEFAULT_NAMESPACE);
    Some(format!("{kind}:{namespace}/{name}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
