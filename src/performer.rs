//! # Performer
//!
//! Playback wrapper around a sealed [`Partition`]: a [`Combiner`]
//! driven through a cursor that understands loop regions and position
//! jumps, with a [`VoiceTracker`] keeping every batch playable.
//!
//! Lifecycle: `Armed` (positioned, next press plays the current pair),
//! `Playing`, `Stopping` (past the last pair, letting held notes ring)
//! and `Stopped`. Jumps and stops never call back into a host; methods
//! that end sounding notes return the corresponding note-off batch for
//! the caller to dispatch.

use std::collections::BTreeMap;

use crate::events::{Command, NoteEvent, NoteKey};
use crate::partition::{Partition, StepPair};
use crate::render::{CombineOptions, Combiner, StepSource};
use crate::voices::VoiceTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformerState {
    /// Positioned; the next press plays the pair at the current index.
    Armed,
    Playing,
    /// Past the loop end without looping: no pairs remain but held
    /// notes may still ring until their releases arrive.
    Stopping,
    Stopped,
}

/// Command-driven playback of a sealed partition.
#[derive(Debug)]
pub struct Performer {
    partition: Partition,
    combiner: Combiner,
    tracker: VoiceTracker,
    /// Voice-count snapshots around each pair: `history[i]` is the
    /// state before pair `i` under straight single-control play, so
    /// `history[len()]` is the state after the final pair.
    history: Vec<BTreeMap<NoteKey, u8>>,
    state: PerformerState,
    looping: bool,
    min: usize,
    max: usize,
    current: usize,
}

impl Performer {
    pub fn new(partition: Partition) -> Self {
        Self::with_options(partition, CombineOptions::default())
    }

    pub fn with_options(partition: Partition, options: CombineOptions) -> Self {
        let history = voice_history(&partition);
        let max = partition.len().saturating_sub(1);
        Performer {
            partition,
            combiner: Combiner::with_options(options),
            tracker: VoiceTracker::new(),
            history,
            state: PerformerState::Armed,
            looping: false,
            min: 0,
            max,
            current: 0,
        }
    }

    /// Resolves one live command, moving the playback cursor as needed,
    /// and returns the batch to perform now.
    pub fn render(&mut self, cmd: Command) -> Vec<NoteEvent> {
        if self.state == PerformerState::Stopped || self.partition.is_empty() {
            return Vec::new();
        }

        let batch = {
            let mut cursor = PlaybackCursor {
                pairs: self.partition.pairs(),
                history: &self.history,
                tracker: &mut self.tracker,
                state: &mut self.state,
                looping: self.looping,
                min: self.min,
                max: self.max,
                current: &mut self.current,
            };
            self.combiner.combine(cmd, &mut cursor)
        };

        let batch = self.tracker.filter_retriggers(batch);
        if self.state == PerformerState::Stopping && self.tracker.is_idle() {
            self.state = PerformerState::Stopped;
        }
        batch
    }

    /// Stops immediately and returns the note-offs that end everything
    /// still sounding.
    pub fn stop(&mut self) -> Vec<NoteEvent> {
        self.state = PerformerState::Stopped;
        let offs = self.tracker.all_note_offs();
        self.tracker.clear();
        self.combiner.clear();
        offs
    }

    /// Jumps to `index` (clamped to the loop region) and re-arms.
    /// Returns the clamped index and the note-offs ending whatever was
    /// sounding before the jump.
    pub fn set_position(&mut self, index: usize) -> (usize, Vec<NoteEvent>) {
        let offs = self.stop();
        self.current = index.clamp(self.min, self.max);
        self.state = PerformerState::Armed;
        (self.current, offs)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Sets both loop bounds (clamped to the partition). If the current
    /// position falls outside the new region it is pulled back in;
    /// the returned note-offs end whatever was sounding.
    pub fn set_loop_region(&mut self, start: usize, end: usize) -> Vec<NoteEvent> {
        if self.partition.is_empty() {
            return Vec::new();
        }
        let last = self.partition.len() - 1;
        self.min = start.min(end).min(last);
        self.max = end.max(start).min(last);
        self.realign_position()
    }

    pub fn set_loop_start(&mut self, start: usize) -> (usize, Vec<NoteEvent>) {
        if self.partition.is_empty() {
            return (0, Vec::new());
        }
        let last = self.partition.len() - 1;
        self.min = start.min(self.max).min(last);
        (self.min, self.realign_position())
    }

    pub fn set_loop_end(&mut self, end: usize) -> (usize, Vec<NoteEvent>) {
        if self.partition.is_empty() {
            return (0, Vec::new());
        }
        let last = self.partition.len() - 1;
        self.max = end.max(self.min).min(last);
        (self.max, self.realign_position())
    }

    fn realign_position(&mut self) -> Vec<NoteEvent> {
        if self.current < self.min {
            self.set_position(self.min).1
        } else if self.current > self.max {
            let (_, offs) = self.set_position(self.max);
            self.state = PerformerState::Stopped;
            offs
        } else {
            Vec::new()
        }
    }

    pub fn loop_region(&self) -> (usize, usize) {
        (self.min, self.max)
    }

    pub fn state(&self) -> PerformerState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PerformerState::Stopped
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The pair the next press will play, for scheduling lookahead.
    /// `None` once the next press would run off the end.
    pub fn peek_next(&self) -> Option<&StepPair> {
        let next = advance_index(
            self.state,
            self.current,
            self.min,
            self.max,
            self.looping,
            self.partition.len(),
        );
        self.partition.pairs().get(next)
    }

    /// Note-offs for everything currently sounding, without stopping.
    pub fn all_note_offs(&self) -> Vec<NoteEvent> {
        self.tracker.all_note_offs()
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn len(&self) -> usize {
        self.partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }
}

/// Where the next press lands: in place when armed, forward while pairs
/// remain, back to the loop start when looping, past the end otherwise.
fn advance_index(
    state: PerformerState,
    current: usize,
    min: usize,
    max: usize,
    looping: bool,
    len: usize,
) -> usize {
    if state == PerformerState::Armed {
        current
    } else if current < max {
        current + 1
    } else if looping {
        min
    } else {
        len
    }
}

fn voice_history(partition: &Partition) -> Vec<BTreeMap<NoteKey, u8>> {
    let mut tracker = VoiceTracker::new();
    let mut history = Vec::with_capacity(partition.len() + 1);
    history.push(BTreeMap::new());
    for pair in partition.pairs() {
        tracker.filter_retriggers(pair.onset.events.clone());
        tracker.filter_retriggers(pair.release.events.clone());
        history.push(tracker.snapshot());
    }
    history
}

/// The performer's step source: maintains the pair index across
/// presses, wrapping at the loop end and closing dangling voices at the
/// region edges.
struct PlaybackCursor<'a> {
    pairs: &'a [StepPair],
    history: &'a [BTreeMap<NoteKey, u8>],
    tracker: &'a mut VoiceTracker,
    state: &'a mut PerformerState,
    looping: bool,
    min: usize,
    max: usize,
    current: &'a mut usize,
}

impl StepSource for PlaybackCursor<'_> {
    fn next_pair(&mut self) -> StepPair {
        let next = advance_index(
            *self.state,
            *self.current,
            self.min,
            self.max,
            self.looping,
            self.pairs.len(),
        );

        if next == self.pairs.len() {
            *self.state = PerformerState::Stopping;
            *self.current = self.max;
            return StepPair::empty();
        }
        *self.current = next;

        if *self.state == PerformerState::Armed {
            *self.state = PerformerState::Playing;
        }

        if next == self.min {
            // entering the loop start: upcoming note-offs may belong to
            // onsets the wrap skipped, fold them into the live count
            let mut merged = self.history[self.min].clone();
            for (key, count) in self.tracker.snapshot() {
                *merged.entry(key).or_insert(0) += count;
            }
            self.tracker.restore(merged);
        }

        let mut pair = self.pairs[next].clone();
        if next == self.max {
            // last pair of the region: append whatever would still ring
            // after it under straight play, so the final release ends
            // everything
            pair.release
                .events
                .extend(VoiceTracker::note_offs_for(&self.history[self.max + 1]));
        }
        pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StepBuilder;

    fn on(pitch: u8) -> NoteEvent {
        NoteEvent::onset(pitch, 100, 0)
    }

    fn off(pitch: u8) -> NoteEvent {
        NoteEvent::release(pitch, 0)
    }

    fn press(id: u8) -> Command {
        Command::press(id, 100, 0)
    }

    fn release(id: u8) -> Command {
        Command::release(id, 0)
    }

    fn minimal_performer() -> Performer {
        // pairs: (on 60, -) then (on 62, off 60 + off 62)
        let mut builder = StepBuilder::new();
        builder.push_event(1, on(60));
        builder.push_event(1, on(62));
        builder.push_event(1, off(60));
        builder.push_event(1, off(62));
        Performer::new(builder.finalize())
    }

    #[test]
    fn test_straight_play_reaches_stopped() {
        let mut performer = minimal_performer();
        assert_eq!(performer.render(press(1)), vec![on(60)]);
        assert_eq!(performer.render(release(1)), vec![]);
        assert_eq!(performer.render(press(1)), vec![on(62)]);
        assert_eq!(performer.render(release(1)), vec![off(60), off(62)]);

        // off the end with nothing ringing: straight to Stopped
        assert_eq!(performer.render(press(1)), vec![]);
        assert_eq!(performer.state(), PerformerState::Stopped);
        assert_eq!(performer.render(press(1)), vec![]);
    }

    #[test]
    fn test_single_pair_loop_retriggers_cleanly() {
        let mut builder = StepBuilder::new();
        builder.push_event(1, on(60));
        builder.push_event(1, off(60));
        let mut performer = Performer::new(builder.finalize());
        performer.set_looping(true);

        assert_eq!(performer.render(press(1)), vec![on(60)]);
        // wrap with 60 still sounding: the retrigger ends it first
        assert_eq!(performer.render(press(1)), vec![off(60), on(60)]);
        assert_eq!(performer.render(release(1)), vec![off(60)]);
        assert!(performer.all_note_offs().is_empty());
    }

    #[test]
    fn test_loop_region_end_closes_dangling_notes() {
        let mut performer = minimal_performer();
        performer.set_loop_region(0, 0);
        performer.set_looping(true);

        // pair 0 has no release material of its own; the region-end
        // close-out supplies the off for the dangling 60
        assert_eq!(performer.render(press(1)), vec![on(60)]);
        assert_eq!(performer.render(release(1)), vec![off(60)]);
        // and the wrap starts over cleanly
        assert_eq!(performer.render(press(1)), vec![on(60)]);
        assert_eq!(performer.render(release(1)), vec![off(60)]);
    }

    #[test]
    fn test_stop_returns_note_offs_for_sounding_notes() {
        let mut performer = minimal_performer();
        performer.render(press(1));
        performer.render(release(1));
        performer.render(press(2));

        assert_eq!(performer.stop(), vec![off(60), off(62)]);
        assert!(performer.is_stopped());
        assert_eq!(performer.render(press(1)), vec![]);
    }

    #[test]
    fn test_set_position_rearms() {
        let mut performer = minimal_performer();
        assert_eq!(performer.render(press(1)), vec![on(60)]);

        let (index, offs) = performer.set_position(1);
        assert_eq!(index, 1);
        assert_eq!(offs, vec![off(60)]);
        assert_eq!(performer.state(), PerformerState::Armed);

        assert_eq!(performer.render(press(1)), vec![on(62)]);
        assert_eq!(performer.render(release(1)), vec![off(60), off(62)]);
    }

    #[test]
    fn test_loop_region_is_clamped() {
        let mut performer = minimal_performer();
        performer.set_loop_region(5, 99);
        assert_eq!(performer.loop_region(), (1, 1));
        assert_eq!(performer.current_index(), 1);
    }

    #[test]
    fn test_empty_partition_renders_nothing() {
        let mut performer = Performer::new(StepBuilder::new().finalize());
        assert_eq!(performer.render(press(1)), vec![]);
        assert!(performer.peek_next().is_none());
    }
}
