#![forbid(unsafe_code)]

use crate::ids::ExternalId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One optional value per OTU of the owning OTU set.
///
/// The key set always mirrors the OTU set: `sync_keys` adds an empty slot for
/// every new OTU and drops the slots of OTUs that went away.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtuKeyedMap<V> {
    slots: BTreeMap<ExternalId, Option<V>>,
}

impl<V> Default for OtuKeyedMap<V> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<V> OtuKeyedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains_key(&self, otu: &ExternalId) -> bool {
        self.slots.contains_key(otu)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ExternalId> {
        self.slots.keys()
    }

    pub fn get(&self, otu: &ExternalId) -> Option<&V> {
        self.slots.get(otu).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, otu: &ExternalId) -> Option<&mut V> {
        self.slots.get_mut(otu).and_then(Option::as_mut)
    }

    /// Empties the slot for `otu`, keeping the key.
    pub fn take(&mut self, otu: &ExternalId) -> Option<V> {
        self.slots.get_mut(otu).and_then(Option::take)
    }

    /// Fills the slot for `otu`, returning what it held before.
    pub fn put(&mut self, otu: ExternalId, value: Option<V>) -> Option<V> {
        self.slots.insert(otu, value).flatten()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.values().filter_map(Option::as_ref)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.slots.values_mut().filter_map(Option::as_mut)
    }

    /// Empties every slot and returns the values that were held.
    pub fn drain_values(&mut self) -> Vec<V> {
        self.slots.values_mut().filter_map(Option::take).collect()
    }

    /// Re-keys the map to exactly `otus`. Returns the values of removed keys.
    pub fn sync_keys(&mut self, otus: &[ExternalId]) -> Vec<V> {
        let wanted: BTreeSet<&ExternalId> = otus.iter().collect();
        let stale: Vec<ExternalId> = self
            .slots
            .keys()
            .filter(|key| !wanted.contains(key))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        for key in stale {
            if let Some(Some(value)) = self.slots.remove(&key) {
                removed.push(value);
            }
        }
        for otu in otus {
            self.slots.entry(otu.clone()).or_insert(None);
        }
        removed
    }
}
