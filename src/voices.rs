//! # Voice Tracker
//!
//! Real-time count of active voices per note, used to keep a batch
//! playable on a backend without voice stealing:
//! - a note triggered while already sounding gets a note-off inserted
//!   in front of its retrigger;
//! - a note-off for a note triggered more than once is swallowed until
//!   the last voice actually ends.
//!
//! The tracker can also synthesize an all-notes-off batch for whatever
//! is sounding, which is how jumps and stops end cleanly.

use std::collections::BTreeMap;

use crate::events::{NoteEvent, NoteKey};

/// Per-note active-voice counts. Keyed by a `BTreeMap` so generated
/// batches come out in a stable order.
#[derive(Debug, Clone, Default)]
pub struct VoiceTracker {
    voices: BTreeMap<NoteKey, u8>,
}

impl VoiceTracker {
    pub fn new() -> Self {
        VoiceTracker::default()
    }

    /// Feeds a batch through the voice count and returns it rewritten:
    /// retriggered notes are preceded by their note-off, surplus
    /// note-offs of multiply-triggered notes are dropped. A note-off
    /// for a note that was never triggered passes through untouched.
    pub fn filter_retriggers(&mut self, batch: Vec<NoteEvent>) -> Vec<NoteEvent> {
        let mut inserted_offs: Vec<NoteEvent> = Vec::new();
        let mut kept: Vec<NoteEvent> = Vec::new();

        for event in batch {
            let key = event.key();
            match self.voices.get(&key).copied() {
                None => {
                    if event.on {
                        self.voices.insert(key, 1);
                    }
                    kept.push(event);
                }
                Some(count) => {
                    if event.on {
                        inserted_offs.push(NoteEvent::release(key.pitch, key.channel));
                        self.voices.insert(key, count + 1);
                        kept.push(event);
                    } else if count > 1 {
                        // swallowed: other voices of this note still sound
                        self.voices.insert(key, count - 1);
                    } else {
                        self.voices.remove(&key);
                        kept.push(event);
                    }
                }
            }
        }

        inserted_offs.extend(kept);
        inserted_offs
    }

    /// A note-off for every active voice, in key order.
    pub fn all_note_offs(&self) -> Vec<NoteEvent> {
        Self::note_offs_for(&self.voices)
    }

    /// A note-off for every voice counted in `state`.
    pub fn note_offs_for(state: &BTreeMap<NoteKey, u8>) -> Vec<NoteEvent> {
        let mut offs = Vec::new();
        for (key, count) in state {
            for _ in 0..*count {
                offs.push(NoteEvent::release(key.pitch, key.channel));
            }
        }
        offs
    }

    pub fn snapshot(&self) -> BTreeMap<NoteKey, u8> {
        self.voices.clone()
    }

    pub fn restore(&mut self, state: BTreeMap<NoteKey, u8>) {
        self.voices = state;
    }

    /// True when no voice is sounding.
    pub fn is_idle(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }
}
