//! The shape of one event type as served by the remote endpoint.
//!
//! Every source hands back plain JSON values; [`RawEventType::from_value`]
//! turns one of them into a typed record or explains why it cannot.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{ProviderError, Result};

/// A single Knative event type, as served by the remote endpoint.
///
/// Only `type` is required. Everything else defaults to absent or empty, and
/// unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventType {
    /// CloudEvent type, e.g. `dev.knative.sources.ping`. Key for
    /// de-duplication.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Name of the EventType resource in the cluster.
    pub name: Option<String>,

    pub namespace: Option<String>,

    pub description: Option<String>,

    /// Inline schema document, passed through as the API definition.
    pub schema_data: Option<String>,

    /// Link to an externally hosted schema.
    #[serde(rename = "schemaURL")]
    pub schema_url: Option<String>,

    pub labels: Option<BTreeMap<String, String>>,

    pub annotations: Option<BTreeMap<String, String>>,

    /// The resource (usually a broker) that produces events of this type.
    pub reference: Option<RawReference>,
}

/// Reference to the Kubernetes object that emits an event type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReference {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl RawEventType {
    /// Decode and validate one record. `index` is the record's position in
    /// the fetched array and only appears in error messages.
    pub fn from_value(index: usize, value: serde_json::Value) -> Result<Self> {
        let record: RawEventType = serde_json::from_value(value)
            .map_err(|e| ProviderError::Mapping(format!("record {index}: {e}")))?;
        if record.event_type.trim().is_empty() {
            return Err(ProviderError::Mapping(format!(
                "record {index}: type must not be empty"
            )));
        }
        Ok(record)
    }
}
