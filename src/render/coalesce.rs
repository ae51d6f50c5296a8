//! Release coalescing buffer: resolved-but-unemitted note-off groups.
//!
//! When a press consumes a step pair, the pair's whole release group is
//! deferred here under the pressed control. The group is flushed as a
//! single batch by the command that releases that control, however many
//! authored release steps were folded into it at seal time.

use std::collections::HashMap;

use crate::events::{ControlKey, NoteEvent};

#[derive(Debug, Clone, Default)]
pub struct CoalescingBuffer {
    deferred: HashMap<ControlKey, Vec<NoteEvent>>,
}

impl CoalescingBuffer {
    pub fn new() -> Self {
        CoalescingBuffer::default()
    }

    /// Parks `releases` under `key`, replacing whatever was held there.
    pub fn defer(&mut self, key: ControlKey, releases: Vec<NoteEvent>) {
        self.deferred.insert(key, releases);
    }

    /// Removes and returns the group held under `key`.
    pub fn take(&mut self, key: ControlKey) -> Option<Vec<NoteEvent>> {
        self.deferred.remove(&key)
    }

    pub fn is_holding(&self, key: ControlKey) -> bool {
        self.deferred.contains_key(&key)
    }

    /// Whether any deferred group still carries events. Empty groups
    /// (a pair without release material) do not count.
    pub fn has_material(&self) -> bool {
        self.deferred.values().any(|group| !group.is_empty())
    }

    pub fn clear(&mut self) {
        self.deferred.clear();
    }
}
