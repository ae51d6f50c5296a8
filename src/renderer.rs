//! # Renderer
//!
//! The two-phase surface of the engine: an authoring phase that feeds
//! timed note events into a [`StepBuilder`], then a performing phase
//! that resolves live commands against the sealed [`Partition`] through
//! a linear consumption cursor.
//!
//! Each `combine` call is a pure, synchronous state transition:
//! replaying the same `push_event`/`finalize`/`combine` sequence always
//! reproduces the same batches. Protocol misuse (pushing after the seal,
//! sealing twice, resolving before any seal) is reported as a
//! [`PartitaError`]; malformed partition content and exhaustion degrade
//! to empty batches instead.
//!
//! ## Usage
//! ```rust
//! use partita::{Command, NoteEvent, Renderer};
//!
//! let mut renderer = Renderer::new();
//! renderer.push_event(0, NoteEvent::onset(60, 100, 0)).unwrap();
//! renderer.push_event(1, NoteEvent::release(60, 0)).unwrap();
//! renderer.finalize().unwrap();
//!
//! let batch = renderer.combine(Command::press(36, 110, 0)).unwrap();
//! assert_eq!(batch, vec![NoteEvent::onset(60, 110, 0)]);
//!
//! let batch = renderer.combine(Command::release(36, 0)).unwrap();
//! assert_eq!(batch, vec![NoteEvent::release(60, 0)]);
//! assert!(!renderer.has_events(true));
//! ```

use crate::builder::StepBuilder;
use crate::error::PartitaError;
use crate::events::{Command, ControlKey, NoteEvent};
use crate::partition::{GroupingOptions, Partition, StepPair};
use crate::render::{Binding, CombineOptions, Combiner, StepSource};

/// Where the resolver currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No sealed material to resolve against.
    Empty,
    /// The cursor still has unconsumed step pairs.
    HasPendingOnsets,
    /// All pairs are consumed and deferred release material awaits its
    /// flushing commands.
    HasBufferedCoalescence,
    /// All pairs are consumed, controls are still held but nothing
    /// audible remains to flush.
    HasPendingReleases,
    /// Everything is consumed and flushed. Terminal.
    Exhausted,
}

#[derive(Debug)]
enum Phase {
    Authoring(StepBuilder),
    Performing { partition: Partition, cursor: usize },
}

/// The orchestrating state machine: step builder, partition cursor,
/// binding table and coalescing buffer behind one surface.
#[derive(Debug)]
pub struct Renderer {
    phase: Phase,
    combiner: Combiner,
    grouping: GroupingOptions,
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_options(GroupingOptions::default(), CombineOptions::default())
    }

    pub fn with_options(grouping: GroupingOptions, combine: CombineOptions) -> Self {
        Renderer {
            phase: Phase::Authoring(StepBuilder::with_options(grouping)),
            combiner: Combiner::with_options(combine),
            grouping,
        }
    }

    /// Wraps an already sealed partition, skipping the authoring phase.
    pub fn from_partition(partition: Partition) -> Self {
        Self::from_partition_with_options(partition, CombineOptions::default())
    }

    pub fn from_partition_with_options(partition: Partition, combine: CombineOptions) -> Self {
        Renderer {
            phase: Phase::Performing {
                partition,
                cursor: 0,
            },
            combiner: Combiner::with_options(combine),
            grouping: GroupingOptions::default(),
        }
    }

    /// Authoring-phase append. Fails once the partition is sealed.
    pub fn push_event(&mut self, delta: u64, event: NoteEvent) -> Result<(), PartitaError> {
        match &mut self.phase {
            Phase::Authoring(builder) => {
                builder.push_event(delta, event);
                Ok(())
            }
            Phase::Performing { .. } => Err(PartitaError::Sealed),
        }
    }

    /// Seals the partition and enters the performing phase. Sealing is
    /// a one-shot operation; a second call fails.
    pub fn finalize(&mut self) -> Result<(), PartitaError> {
        match &mut self.phase {
            Phase::Authoring(builder) => {
                let builder = std::mem::take(builder);
                self.phase = Phase::Performing {
                    partition: builder.finalize(),
                    cursor: 0,
                };
                Ok(())
            }
            Phase::Performing { .. } => Err(PartitaError::AlreadySealed),
        }
    }

    /// Whether unconsumed step pairs remain. With `lookahead`, also
    /// reports true while deferred release material awaits its flush,
    /// so a caller keeps driving [`combine`](Renderer::combine) until
    /// everything sounded has been ended.
    pub fn has_events(&self, lookahead: bool) -> bool {
        match &self.phase {
            Phase::Authoring(_) => false,
            Phase::Performing { partition, cursor } => {
                *cursor < partition.len()
                    || (lookahead && self.combiner.has_pending_material())
            }
        }
    }

    /// Resolves one live command and returns the batch to perform now.
    ///
    /// Exhaustion and partition incoherence yield empty batches; only
    /// resolving before [`finalize`](Renderer::finalize) is an error.
    pub fn combine(&mut self, cmd: Command) -> Result<Vec<NoteEvent>, PartitaError> {
        match &mut self.phase {
            Phase::Authoring(_) => Err(PartitaError::NotSealed),
            Phase::Performing { partition, cursor } => {
                let mut source = LinearCursor {
                    pairs: partition.pairs(),
                    position: cursor,
                };
                Ok(self.combiner.combine(cmd, &mut source))
            }
        }
    }

    pub fn state(&self) -> ResolverState {
        match &self.phase {
            Phase::Authoring(_) => ResolverState::Empty,
            Phase::Performing { partition, cursor } => {
                if *cursor < partition.len() {
                    ResolverState::HasPendingOnsets
                } else if self.combiner.has_pending_material() {
                    ResolverState::HasBufferedCoalescence
                } else if self.combiner.has_bindings() {
                    ResolverState::HasPendingReleases
                } else if partition.is_empty() {
                    ResolverState::Empty
                } else {
                    ResolverState::Exhausted
                }
            }
        }
    }

    /// The sealed partition, once finalize has run.
    pub fn partition(&self) -> Option<&Partition> {
        match &self.phase {
            Phase::Authoring(_) => None,
            Phase::Performing { partition, .. } => Some(partition),
        }
    }

    /// The pitches currently held by `control`, if it is bound.
    pub fn held_pitches(&self, control: ControlKey) -> Option<&[Binding]> {
        self.combiner.held(control)
    }

    /// Resets to an empty authoring phase, keeping the configured
    /// options.
    pub fn clear(&mut self) {
        self.phase = Phase::Authoring(StepBuilder::with_options(self.grouping));
        self.combiner.clear();
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}

/// Monotonic front-to-back consumption of the pair view.
struct LinearCursor<'a> {
    pairs: &'a [StepPair],
    position: &'a mut usize,
}

impl StepSource for LinearCursor<'_> {
    fn next_pair(&mut self) -> StepPair {
        match self.pairs.get(*self.position) {
            Some(pair) => {
                *self.position += 1;
                pair.clone()
            }
            None => StepPair::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(pitch: u8) -> NoteEvent {
        NoteEvent::onset(pitch, 100, 0)
    }

    fn off(pitch: u8) -> NoteEvent {
        NoteEvent::release(pitch, 0)
    }

    #[test]
    fn test_push_after_finalize_fails() {
        let mut renderer = Renderer::new();
        renderer.push_event(0, on(60)).unwrap();
        renderer.finalize().unwrap();
        assert_eq!(
            renderer.push_event(1, off(60)),
            Err(PartitaError::Sealed)
        );
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut renderer = Renderer::new();
        renderer.finalize().unwrap();
        assert_eq!(renderer.finalize(), Err(PartitaError::AlreadySealed));
    }

    #[test]
    fn test_combine_before_finalize_fails() {
        let mut renderer = Renderer::new();
        assert_eq!(
            renderer.combine(Command::press(1, 100, 0)),
            Err(PartitaError::NotSealed)
        );
    }

    #[test]
    fn test_empty_partition_is_a_steady_no_op() {
        let mut renderer = Renderer::new();
        renderer.finalize().unwrap();
        assert_eq!(renderer.state(), ResolverState::Empty);
        assert!(!renderer.has_events(true));
        assert_eq!(renderer.combine(Command::press(1, 100, 0)), Ok(vec![]));
    }

    #[test]
    fn test_state_transitions() {
        let mut renderer = Renderer::new();
        assert_eq!(renderer.state(), ResolverState::Empty);

        renderer.push_event(0, on(60)).unwrap();
        renderer.push_event(1, off(60)).unwrap();
        renderer.finalize().unwrap();
        assert_eq!(renderer.state(), ResolverState::HasPendingOnsets);

        renderer.combine(Command::press(1, 100, 0)).unwrap();
        assert_eq!(renderer.state(), ResolverState::HasBufferedCoalescence);

        renderer.combine(Command::release(1, 0)).unwrap();
        assert_eq!(renderer.state(), ResolverState::Exhausted);
    }

    #[test]
    fn test_clear_returns_to_authoring() {
        let mut renderer = Renderer::new();
        renderer.push_event(0, on(60)).unwrap();
        renderer.finalize().unwrap();

        renderer.clear();
        assert_eq!(renderer.state(), ResolverState::Empty);
        assert!(renderer.push_event(0, on(62)).is_ok());
        renderer.finalize().unwrap();
        assert_eq!(
            renderer.combine(Command::press(1, 100, 0)),
            Ok(vec![NoteEvent::onset(62, 100, 0)])
        );
    }
}
