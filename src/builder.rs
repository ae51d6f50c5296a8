//! # Step Builder
//!
//! Groups a stream of `(delta, event)` pairs into simultaneity steps.
//!
//! The builder is the authoring half of the engine: it performs pure
//! delta grouping and nothing else. No event is dropped or reordered
//! here, malformed material included; tolerating incoherent partitions
//! is the resolver's job.
//!
//! ## Usage
//! ```rust
//! use partita::{NoteEvent, StepBuilder};
//!
//! let mut builder = StepBuilder::new();
//! builder.push_event(0, NoteEvent::onset(60, 100, 0));
//! builder.push_event(0, NoteEvent::onset(64, 100, 0)); // joins the chord
//! builder.push_event(1, NoteEvent::release(60, 0));    // new step
//! builder.push_event(0, NoteEvent::release(64, 0));
//!
//! let partition = builder.finalize();
//! assert_eq!(partition.steps().len(), 2);
//! ```

use crate::events::NoteEvent;
use crate::partition::{GroupingOptions, Partition, Step};

/// Incremental builder for a [`Partition`].
///
/// `delta <= simultaneity_threshold` joins the current step; a larger
/// delta starts a new one. The very first event always starts step 1,
/// whatever its delta.
#[derive(Debug, Default)]
pub struct StepBuilder {
    options: GroupingOptions,
    steps: Vec<Step>,
    current: Option<Step>,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::with_options(GroupingOptions::default())
    }

    pub fn with_options(options: GroupingOptions) -> Self {
        StepBuilder {
            options,
            steps: Vec::new(),
            current: None,
        }
    }

    /// Appends `event`, `delta` time units after the previous one.
    pub fn push_event(&mut self, delta: u64, event: NoteEvent) {
        match &mut self.current {
            None => {
                self.current = Some(Step::single(delta, event));
            }
            Some(step) if delta > self.options.simultaneity_threshold => {
                let done = std::mem::replace(step, Step::single(delta, event));
                self.steps.push(done);
            }
            Some(step) => step.events.push(event),
        }
    }

    /// Number of completed and in-progress steps so far.
    pub fn len(&self) -> usize {
        self.steps.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seals the in-progress step and derives the pair view.
    ///
    /// Consumes the builder: a sealed partition can no longer grow.
    pub fn finalize(mut self) -> Partition {
        if let Some(step) = self.current.take() {
            self.steps.push(step);
        }
        Partition::seal(self.steps, self.options)
    }
}
