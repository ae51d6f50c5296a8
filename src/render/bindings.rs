//! Control binding table: which pitches each control currently holds.
//!
//! Entries are advisory memory, not ownership: a binding records the
//! pitch/channel/velocity values of the onsets a press consumed, and the
//! most recent press of a control always wins. An absent entry on
//! release marks an orphan, which the resolver tolerates silently.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::{ControlKey, NoteEvent};

/// The values remembered for one consumed onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub pitch: u8,
    pub channel: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: HashMap<ControlKey, Vec<Binding>>,
}

impl BindingTable {
    pub fn new() -> Self {
        BindingTable::default()
    }

    /// Records the onsets of `batch` under `key`, overwriting any prior
    /// binding. Release events in the batch are ignored. An empty
    /// binding still counts as bound: a press of an exhausted partition
    /// holds nothing but is not an orphan.
    pub fn bind(&mut self, key: ControlKey, batch: &[NoteEvent]) {
        let bindings = batch
            .iter()
            .filter(|e| e.on)
            .map(|e| Binding {
                pitch: e.pitch,
                channel: e.channel,
                velocity: e.velocity,
            })
            .collect();
        self.entries.insert(key, bindings);
    }

    /// The most recently bound values for `key`, or `None` for an
    /// orphan.
    pub fn resolve(&self, key: ControlKey) -> Option<&[Binding]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    pub fn unbind(&mut self, key: ControlKey) -> Option<Vec<Binding>> {
        self.entries.remove(&key)
    }

    pub fn is_bound(&self, key: ControlKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn has_bindings(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u8) -> ControlKey {
        ControlKey { id, channel: 0 }
    }

    #[test]
    fn test_most_recent_press_wins() {
        let mut table = BindingTable::new();
        table.bind(key(1), &[NoteEvent::onset(60, 100, 0)]);
        table.bind(key(1), &[NoteEvent::onset(64, 90, 0)]);

        let bound = table.resolve(key(1)).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].pitch, 64);
        assert_eq!(bound[0].velocity, 90);
    }

    #[test]
    fn test_releases_in_batch_are_not_bound() {
        let mut table = BindingTable::new();
        table.bind(
            key(1),
            &[NoteEvent::release(50, 0), NoteEvent::onset(60, 100, 0)],
        );
        let bound = table.resolve(key(1)).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].pitch, 60);
    }

    #[test]
    fn test_unbound_key_is_orphan() {
        let mut table = BindingTable::new();
        assert!(table.resolve(key(3)).is_none());
        assert!(table.unbind(key(3)).is_none());
    }

    #[test]
    fn test_empty_binding_counts_as_bound() {
        let mut table = BindingTable::new();
        table.bind(key(2), &[]);
        assert!(table.is_bound(key(2)));
        assert_eq!(table.resolve(key(2)).unwrap().len(), 0);
    }
}
