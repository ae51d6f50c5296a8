//! The combine algorithm: one live command in, one note batch out.

use serde::{Deserialize, Serialize};

use crate::events::{Command, ControlKey, NoteEvent};
use crate::partition::StepPair;

use super::bindings::{Binding, BindingTable};
use super::coalesce::CoalescingBuffer;

/// Supplies the next unconsumed step pair to the combiner.
///
/// Implementors decide how the consumption cursor moves: linearly for a
/// plain renderer, with loop wraps and jumps for a performer. When the
/// source is exhausted it returns [`StepPair::empty`]; the combiner
/// treats that as a no-op press, never an error.
pub trait StepSource {
    fn next_pair(&mut self) -> StepPair;
}

/// Per-instance resolution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineOptions {
    /// Overwrite the velocity of consumed onsets with the velocity of
    /// the press that consumed them.
    pub use_command_velocity: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        CombineOptions {
            use_command_velocity: true,
        }
    }
}

/// The stateful resolution core. Owns the binding table and the
/// coalescing buffer; the step cursor stays with the caller behind a
/// [`StepSource`].
///
/// Invariant: a control is bound exactly while the buffer holds its
/// (possibly empty) deferred release group. The two structures are
/// always updated together.
#[derive(Debug, Clone, Default)]
pub struct Combiner {
    bindings: BindingTable,
    deferred: CoalescingBuffer,
    options: CombineOptions,
}

impl Combiner {
    pub fn new() -> Self {
        Combiner::default()
    }

    pub fn with_options(options: CombineOptions) -> Self {
        Combiner {
            bindings: BindingTable::new(),
            deferred: CoalescingBuffer::new(),
            options,
        }
    }

    /// Resolves one command against the next material of `source` and
    /// returns the batch of note events to perform now.
    ///
    /// Press: pull the next pair, return its onset group immediately,
    /// bind the consumed pitches to the pressed control and defer the
    /// pair's release group under it. If the control is still held from
    /// an earlier press, its deferred group is flushed at the front of
    /// the batch so re-pressing a sounding control ends the old notes
    /// first.
    ///
    /// Release: flush the deferred group of the released control, or
    /// return an empty batch for an orphan.
    pub fn combine(&mut self, cmd: Command, source: &mut dyn StepSource) -> Vec<NoteEvent> {
        let key = cmd.key();

        if cmd.pressed {
            let pair = source.next_pair();
            let mut batch = pair.onset.events;
            if self.options.use_command_velocity {
                for event in batch.iter_mut().filter(|e| e.on) {
                    event.velocity = cmd.velocity;
                }
            }
            if let Some(mut held) = self.deferred.take(key) {
                held.append(&mut batch);
                batch = held;
            }
            self.bindings.bind(key, &batch);
            self.deferred.defer(key, pair.release.events);
            batch
        } else {
            if !self.bindings.is_bound(key) {
                log::debug!("release of unbound control {:?} ignored", key);
                return Vec::new();
            }
            self.bindings.unbind(key);
            self.deferred.take(key).unwrap_or_default()
        }
    }

    /// Whether any deferred release group still carries events.
    pub fn has_pending_material(&self) -> bool {
        self.deferred.has_material()
    }

    /// Whether any control is currently bound.
    pub fn has_bindings(&self) -> bool {
        self.bindings.has_bindings()
    }

    /// The pitches currently held by `key`, if it is bound.
    pub fn held(&self, key: ControlKey) -> Option<&[Binding]> {
        self.bindings.resolve(key)
    }

    pub fn options(&self) -> CombineOptions {
        self.options
    }

    /// Drops all bindings and deferred material.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.deferred.clear();
    }
}
