//! Per-array identity cache
//!
//! Performance and capacity reports only carry opaque ids. The cache maps
//! `(resource kind, id)` to the display name (and, for volume groups, the
//! owning appliances) so samples can be labelled.
//!
//! The cache is built once when an array is registered and never refreshed:
//! resources created on the array afterwards are not fanned out to, and
//! resolve to no name, until the exporter restarts.

use crate::client::ArrayClient;
use crate::models::ResourceKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// One cached resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityEntry {
    pub id: String,
    pub name: String,
    /// Only populated for volume groups
    pub appliance_ids: Vec<String>,
}

impl IdentityEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            appliance_ids: Vec::new(),
        }
    }

    pub fn with_appliances(mut self, appliance_ids: Vec<String>) -> Self {
        self.appliance_ids = appliance_ids;
        self
    }

    /// Parse one element of an `id,name` listing; elements without an id are dropped
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = match value.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let appliance_ids = value
            .get("appliance_ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            name,
            appliance_ids,
        })
    }
}

/// Summary of one cache build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub loaded: Vec<(ResourceKind, usize)>,
    pub failed: Vec<ResourceKind>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// id → entry maps for every resource kind of one array.
///
/// Read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    ip: String,
    kinds: HashMap<ResourceKind, BTreeMap<String, IdentityEntry>>,
}

impl IdentityCache {
    /// Empty cache for `ip`
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            kinds: HashMap::new(),
        }
    }

    /// Populate every resource kind from the array.
    ///
    /// A kind whose listing fails is logged and stored as an empty map so the
    /// other kinds stay usable.
    pub async fn build(client: &ArrayClient) -> (Self, BuildReport) {
        let mut cache = Self::new(client.ip());
        let mut report = BuildReport::default();

        for kind in ResourceKind::ALL {
            match client.identities(kind).await {
                Ok(items) => {
                    let entries = items.iter().filter_map(IdentityEntry::from_json);
                    cache.insert_all(kind, entries);
                    let count = cache.len(kind);
                    debug!(ip = %client.ip(), resource = %kind, count = count, "Identity cache loaded");
                    report.loaded.push((kind, count));
                }
                Err(e) => {
                    warn!(ip = %client.ip(), resource = %kind, error = %e, "Init identity list failed");
                    cache.kinds.insert(kind, BTreeMap::new());
                    report.failed.push(kind);
                }
            }
        }

        (cache, report)
    }

    /// Add entries for `kind` (used while building, and by tests)
    pub fn insert_all(&mut self, kind: ResourceKind, entries: impl IntoIterator<Item = IdentityEntry>) {
        let map = self.kinds.entry(kind).or_default();
        for entry in entries {
            map.insert(entry.id.clone(), entry);
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Display name for `id`, if the array reported it at startup
    pub fn lookup(&self, kind: ResourceKind, id: &str) -> Option<&str> {
        self.entry(kind, id).map(|e| e.name.as_str())
    }

    pub fn entry(&self, kind: ResourceKind, id: &str) -> Option<&IdentityEntry> {
        self.kinds.get(&kind)?.get(id)
    }

    /// Entries of `kind`, ordered by id
    pub fn entries(&self, kind: ResourceKind) -> impl Iterator<Item = &IdentityEntry> {
        self.kinds.get(&kind).into_iter().flat_map(|m| m.values())
    }

    /// Ids of `kind`, ordered
    pub fn ids(&self, kind: ResourceKind) -> Vec<String> {
        self.entries(kind).map(|e| e.id.clone()).collect()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.kinds.get(&kind).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(BTreeMap::is_empty)
    }
}
