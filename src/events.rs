//! # Event and Command Model
//!
//! The shared vocabulary of the engine:
//! - [`NoteEvent`] - one note-on or note-off of the authored partition
//! - [`Command`] - one live press or release of an abstract control
//! - [`NoteKey`] / [`ControlKey`] - map keys identifying a note or a
//!   control across channels
//!
//! A `Command`'s `id` is an opaque control identifier, *not* a pitch: the
//! resolution engine decides which pitches a press stands for. Velocity
//! and channel are carried through untouched unless the host opts into
//! command-velocity substitution (see `render::CombineOptions`).

use serde::{Deserialize, Serialize};

/// A single note-on or note-off event of the partition.
///
/// Immutable once created; batches returned by the engine are made of
/// copies of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// `true` for a note-on (onset), `false` for a note-off (release).
    pub on: bool,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl NoteEvent {
    /// A note-on event.
    pub fn onset(pitch: u8, velocity: u8, channel: u8) -> Self {
        NoteEvent {
            on: true,
            pitch,
            velocity,
            channel,
        }
    }

    /// A note-off event. Release velocity 0, as emitted by the engine
    /// when it has to synthesize a note-off itself.
    pub fn release(pitch: u8, channel: u8) -> Self {
        NoteEvent {
            on: false,
            pitch,
            velocity: 0,
            channel,
        }
    }

    pub fn key(&self) -> NoteKey {
        NoteKey {
            pitch: self.pitch,
            channel: self.channel,
        }
    }

    /// Whether `self` and `other` refer to the same note (pitch+channel),
    /// regardless of polarity.
    pub fn corresponds(&self, other: &NoteEvent) -> bool {
        self.pitch == other.pitch && self.channel == other.channel
    }

    /// Whether `self` is a note-off closing the given onset.
    pub fn is_matching_release(&self, onset: &NoteEvent) -> bool {
        !self.on && self.corresponds(onset)
    }
}

/// A live press (`pressed == true`) or release of an abstract control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub pressed: bool,
    /// Opaque control identifier. May be reused across unrelated notes.
    pub id: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl Command {
    pub fn press(id: u8, velocity: u8, channel: u8) -> Self {
        Command {
            pressed: true,
            id,
            velocity,
            channel,
        }
    }

    pub fn release(id: u8, channel: u8) -> Self {
        Command {
            pressed: false,
            id,
            velocity: 0,
            channel,
        }
    }

    pub fn key(&self) -> ControlKey {
        ControlKey {
            id: self.id,
            channel: self.channel,
        }
    }
}

/// Identity of a note across the engine: pitch + channel.
///
/// `Ord` so that batches generated from keyed maps come out in a stable
/// order (deterministic replay is a core guarantee).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteKey {
    pub pitch: u8,
    pub channel: u8,
}

/// Identity of a physical control: id + channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlKey {
    pub id: u8,
    pub channel: u8,
}

/// Whether any event in the slice is an onset.
pub fn has_onset(events: &[NoteEvent]) -> bool {
    events.iter().any(|e| e.on)
}
