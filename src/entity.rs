//! Catalog entity model.
//!
//! [`ApiEntity`] is what the provider hands to the catalog: an `API` kind
//! entity whose spec carries the event type's schema. It serializes into the
//! catalog's wire form (`apiVersion`, `kind`, `metadata`, `spec`).

use std::collections::BTreeMap;

use serde::Serialize;

pub const API_VERSION: &str = "backstage.io/v1alpha1";
pub const API_KIND: &str = "API";

/// Annotation naming the location that manages an entity.
pub const ANNOTATION_LOCATION: &str = "backstage.io/managed-by-location";
/// Annotation naming the location that first introduced an entity.
pub const ANNOTATION_ORIGIN_LOCATION: &str = "backstage.io/managed-by-origin-location";

pub const EVENT_TYPE_API_TYPE: &str = "eventType";
pub const EVENT_MESH_SYSTEM: &str = "knative-event-mesh";
pub const EVENT_TYPE_OWNER: &str = "knative";

/// Relation from an API to the resource that produces it.
pub const RELATION_API_PROVIDED_BY: &str = "apiProvidedBy";

/// Definition used when an event type carries no schema.
pub const EMPTY_DEFINITION: &str = "{}";

/// Longest name the catalog accepts.
const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntity {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: EntityMetadata,
    pub spec: ApiSpec,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<EntityRelation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub links: Vec<EntityLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityLink {
    pub url: String,
    pub title: String,
    pub icon: String,
}

/// A typed edge to another entity, addressed as `kind:namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    #[serde(rename = "type")]
    pub relation_type: &'static str,
    pub target_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiSpec {
    #[serde(rename = "type")]
    pub api_type: &'static str,
    pub lifecycle: String,
    pub system: &'static str,
    pub owner: &'static str,
    pub definition: String,
}

/// Turn an arbitrary event type string into a valid entity name.
///
/// Characters outside `[A-Za-z0-9._-]` become `-`, separators at either end
/// are dropped, and the result is cut to 63 characters. The same input always
/// yields the same name.
pub fn entity_name(event_type: &str) -> String {
    let replaced: String = event_type
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let is_separator = |c: char| matches!(c, '.' | '_' | '-');
    let trimmed = replaced.trim_matches(is_separator);
    let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    truncated.trim_end_matches(is_separator).to_string()
}
