use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::trace;

use crate::ChangeEvent;
use crate::Key;

/// Raw, unvalidated configuration values keyed by slot.
///
/// Missing scalars fall back to their declared default when the staged values are
/// applied, so deleting a scalar here is how it is reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedConfig {
    scalars: BTreeMap<String, Bytes>,
    groups: BTreeMap<String, BTreeMap<String, Bytes>>,
}

impl StagedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        key: &Key,
    ) -> Option<&Bytes> {
        if key.is_scalar() {
            self.scalars.get(&key.name)
        } else {
            self.groups.get(&key.group)?.get(&key.name)
        }
    }

    pub fn scalar(
        &self,
        name: &str,
    ) -> Option<&Bytes> {
        self.scalars.get(name)
    }

    pub fn group(
        &self,
        name: &str,
    ) -> Option<&BTreeMap<String, Bytes>> {
        self.groups.get(name)
    }

    /// Sets one slot, creating its group on first use.
    pub fn insert(
        &mut self,
        key: Key,
        value: impl Into<Bytes>,
    ) {
        if key.is_scalar() {
            self.scalars.insert(key.name, value.into());
        } else {
            self.groups
                .entry(key.group)
                .or_default()
                .insert(key.name, value.into());
        }
    }

    /// Clears one slot; an emptied group is kept as an empty collection.
    pub fn remove(
        &mut self,
        key: &Key,
    ) -> Option<Bytes> {
        if key.is_scalar() {
            self.scalars.remove(&key.name)
        } else {
            self.groups.get_mut(&key.group)?.remove(&key.name)
        }
    }

    /// Folds one change event into the staged values.
    ///
    /// Terminal events and sentinel keys are skipped. Returns whether the event was
    /// applied.
    pub fn from_change_event(
        &mut self,
        event: &ChangeEvent,
    ) -> bool {
        if event.is_terminal() || event.key.is_invalid() {
            return false;
        }

        if event.deleted {
            trace!(key = %event.key, "Staging delete");
            self.remove(&event.key);
        } else {
            trace!(key = %event.key, "Staging put");
            self.insert(event.key.clone(), event.value.clone());
        }
        true
    }
}
