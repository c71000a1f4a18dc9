//! Service descriptors and immutable snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a registered service, unique within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A route/backend pair registered by a client.
///
/// `custom` is opaque to the registry; only the routing policy interprets it.
/// On the wire the fields are capitalised (`ID`, `Address`, `Custom`), the
/// lowercase spelling used by descriptor files is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "ID", alias = "id")]
    pub id: ServiceId,

    /// Backend URL matching traffic is forwarded to.
    #[serde(rename = "Address", alias = "address", default)]
    pub address: String,

    #[serde(rename = "Custom", alias = "custom", default, deserialize_with = "null_as_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// Clients without custom data send `null` rather than `{}`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl Service {
    pub fn new(id: impl Into<ServiceId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            custom: serde_json::Map::new(),
        }
    }

    /// Attach an opaque custom value.
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Immutable view of every registered service at one instant.
///
/// Snapshots are never mutated once published; writers build a private copy
/// with [`ServiceSnapshot::to_builder`] and publish a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceSnapshot {
    services: BTreeMap<ServiceId, Arc<Service>>,
}

impl ServiceSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ServiceId) -> Option<&Arc<Service>> {
        self.services.get(id)
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.services.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ServiceId> {
        self.services.keys()
    }

    pub(crate) fn to_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder {
            services: self.services.clone(),
        }
    }
}

/// Private, mutable copy of a snapshot used while applying a batch.
#[derive(Debug)]
pub(crate) struct SnapshotBuilder {
    services: BTreeMap<ServiceId, Arc<Service>>,
}

impl SnapshotBuilder {
    pub(crate) fn upsert(&mut self, service: Service) {
        self.services.insert(service.id.clone(), Arc::new(service));
    }

    /// Returns `false` when the id was not present.
    pub(crate) fn remove(&mut self, id: &ServiceId) -> bool {
        self.services.remove(id).is_some()
    }

    pub(crate) fn build(self) -> ServiceSnapshot {
        ServiceSnapshot {
            services: self.services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_decodes_wire_and_descriptor_spelling() {
        let wire: Service = serde_json::from_value(json!({
            "ID": "a",
            "Address": "http://127.0.0.1:4000",
            "Custom": {"path": "/api"}
        }))
        .unwrap();
        let file: Service = serde_json::from_value(json!({
            "id": "a",
            "address": "http://127.0.0.1:4000",
            "custom": {"path": "/api"}
        }))
        .unwrap();
        assert_eq!(wire, file);
        assert_eq!(wire.custom["path"], "/api");
    }

    #[test]
    fn service_encodes_capitalised_fields() {
        let service = Service::new("a", "http://127.0.0.1:4000");
        let value = serde_json::to_value(&service).unwrap();
        assert_eq!(value["ID"], "a");
        assert_eq!(value["Address"], "http://127.0.0.1:4000");
        assert!(value["Custom"].as_object().unwrap().is_empty());
    }

    #[test]
    fn builder_leaves_source_snapshot_untouched() {
        let mut builder = ServiceSnapshot::empty().to_builder();
        builder.upsert(Service::new("a", "http://127.0.0.1:4000"));
        let first = builder.build();

        let mut builder = first.to_builder();
        assert!(builder.remove(&"a".into()));
        assert!(!builder.remove(&"missing".into()));
        let second = builder.build();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
