//! # partita
//!
//! Command-driven performance engine for pre-authored note sequences.
//!
//! A live performer controls a pre-authored sequence of note events
//! (the partition) through abstract press/release commands: each press
//! is resolved to the pitches the partition intends at that point of
//! the piece, so a reduced or nonstandard controller can faithfully
//! trigger a fully-voiced score, while tolerating malformed partitions
//! and imperfect live timing.
//!
//! The pipeline:
//! 1. [`StepBuilder`] groups a stream of timed note events into
//!    simultaneity steps.
//! 2. Sealing derives a [`Partition`]: an ordered queue of step pairs,
//!    each pair being the onset group one press consumes and the
//!    release group the matching release flushes
//!    ([`GroupingOptions`] controls the pairing policy).
//! 3. [`Renderer`] resolves live [`Command`]s against the queue,
//!    returning the batch of [`NoteEvent`]s to perform now.
//! 4. [`Performer`] adds loop regions, position jumps and clean
//!    voice handling on top of the same resolution core.
//!
//! The engine is single-threaded and synchronous, performs no I/O and
//! owns no clock: outputs are a deterministic function of the call
//! sequence alone.
//!
//! ## Example
//! ```rust
//! use partita::{Command, NoteEvent};
//!
//! let mut renderer = partita::prepare(vec![
//!     (0, NoteEvent::onset(60, 96, 0)),
//!     (1, NoteEvent::release(60, 0)),
//! ]);
//!
//! // any control id works: the engine decides the pitch
//! let batch = renderer.combine(Command::press(36, 110, 0)).unwrap();
//! assert_eq!(batch, vec![NoteEvent::onset(60, 110, 0)]);
//!
//! let batch = renderer.combine(Command::release(36, 0)).unwrap();
//! assert_eq!(batch, vec![NoteEvent::release(60, 0)]);
//! ```

mod builder;
mod error;
mod events;
mod partition;
mod performer;
mod render;
mod renderer;
mod voices;

pub use builder::StepBuilder;
pub use error::PartitaError;
pub use events::{has_onset, Command, ControlKey, NoteEvent, NoteKey};
pub use partition::{GroupingOptions, Partition, Step, StepPair};
pub use performer::{Performer, PerformerState};
pub use render::{Binding, BindingTable, CoalescingBuffer, CombineOptions, Combiner, StepSource};
pub use renderer::{Renderer, ResolverState};
pub use voices::VoiceTracker;

/// Builds and seals a partition from `(delta, event)` pairs and returns
/// a renderer ready to resolve commands against it.
pub fn prepare<I>(events: I) -> Renderer
where
    I: IntoIterator<Item = (u64, NoteEvent)>,
{
    let mut builder = StepBuilder::new();
    for (delta, event) in events {
        builder.push_event(delta, event);
    }
    Renderer::from_partition(builder.finalize())
}
