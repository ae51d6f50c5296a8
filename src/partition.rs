//! # Partition
//!
//! The sealed, ordered sequence of simultaneity steps, plus the derived
//! pair view the resolver consumes.
//!
//! Sealing runs a grouping pass over the raw authored steps:
//! - adjacent release-only steps merge into one release group;
//! - two adjacent onset groups are separated by an artificial
//!   (initially empty) release group;
//! - a release authored coincident with the next onset group is
//!   detached back into that artificial group when it closes an onset
//!   of the group before it ([`GroupingOptions::detach_coincident_releases`]);
//! - onset groups left with an empty release group may be completed by
//!   matching releases found further down the partition
//!   ([`GroupingOptions::reunite_displaced_releases`]);
//! - within a single group, a release that closes an onset of the same
//!   group is moved in front of it, so a zero-delta retrigger does not
//!   silence itself.
//!
//! The resulting sequence alternates onset groups and release groups
//! and is folded into [`StepPair`]s: one press consumes a pair's onset
//! half, the matching release consumes its release half. Raw steps are
//! kept alongside the pairs, untouched, for introspection.
//!
//! Release material with no preceding onset group anywhere cannot be
//! paired; it is discarded with a warning. Incoherence is absorbed
//! here, never reported as an error.

use serde::{Deserialize, Serialize};

use crate::events::{has_onset, NoteEvent};

/// A set of note events considered simultaneous in the authored
/// partition. `delta` is the distance to the previous step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub delta: u64,
    pub events: Vec<NoteEvent>,
}

impl Step {
    pub fn empty(delta: u64) -> Self {
        Step {
            delta,
            events: Vec::new(),
        }
    }

    pub fn single(delta: u64, event: NoteEvent) -> Self {
        Step {
            delta,
            events: vec![event],
        }
    }

    pub fn has_onset(&self) -> bool {
        has_onset(&self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One queue element of the pair view: the onset group a press consumes
/// and the release group the matching release will flush.
///
/// Either half may be empty. Deltas are preserved so a host can derive
/// scheduling hints from the pair it is about to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPair {
    pub onset: Step,
    pub release: Step,
}

impl StepPair {
    pub fn empty() -> Self {
        StepPair {
            onset: Step::empty(0),
            release: Step::empty(0),
        }
    }
}

/// Policy knobs for the seal-time grouping pass.
///
/// The defaults reproduce the reference batching behavior: coincident
/// releases are detached, displaced releases are left where they were
/// authored (trailing release runs merge into one batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingOptions {
    /// Move a release that is coincident with the next onset group back
    /// into the release slot of the group it closes.
    pub detach_coincident_releases: bool,
    /// Fill empty release slots with matching releases found later in
    /// the partition, re-pairing each onset with its own ending.
    pub reunite_displaced_releases: bool,
    /// Events closer than this are considered simultaneous. The MIDI
    /// standard value is 0.
    pub simultaneity_threshold: u64,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        GroupingOptions {
            detach_coincident_releases: true,
            reunite_displaced_releases: false,
            simultaneity_threshold: 0,
        }
    }
}

/// A sealed partition: the raw authored steps plus the derived pair
/// view. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    steps: Vec<Step>,
    pairs: Vec<StepPair>,
}

impl Partition {
    pub(crate) fn seal(steps: Vec<Step>, options: GroupingOptions) -> Partition {
        let grouped = group_steps(&steps, &options);
        let pairs = pair_up(grouped);
        Partition { steps, pairs }
    }

    /// The raw authored steps, exactly as pushed.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The derived pair view consumed by the resolver.
    pub fn pairs(&self) -> &[StepPair] {
        &self.pairs
    }

    /// Number of step pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// An onset group whose release slot came out empty, remembered so a
/// matching release found later can be routed back into that slot.
struct OpenGroup {
    onsets: Step,
    slot: usize,
}

/// Streaming state of the grouping pass: the most recent input group,
/// the previous group awaiting a pairing decision, and the output
/// sequence built so far.
struct Grouper {
    options: GroupingOptions,
    input: Step,
    buffer: Step,
    started: bool,
    out: Vec<Step>,
    open: Vec<OpenGroup>,
}

impl Grouper {
    fn new(options: GroupingOptions) -> Self {
        Grouper {
            options,
            input: Step::empty(0),
            buffer: Step::empty(0),
            started: false,
            out: Vec::new(),
            open: Vec::new(),
        }
    }

    fn push(&mut self, delta: u64, event: NoteEvent) {
        if !self.started {
            self.input = Step::single(delta, event);
            self.started = true;
            return;
        }

        if self.options.reunite_displaced_releases {
            self.reunite();
        }

        if delta > self.options.simultaneity_threshold {
            self.push_groups(false);
            self.input = Step::single(delta, event);
        } else {
            self.input.events.push(event);
        }
    }

    /// Routes releases held in the current input group back to open
    /// groups they close. A group is closed by its first match; later
    /// releases no longer reach it.
    fn reunite(&mut self) {
        let input = &mut self.input;
        let out = &mut self.out;
        self.open
            .retain(|group| !move_matching_releases(input, &group.onsets, &mut out[group.slot]));
    }

    /// Resolves the buffered group against the current input group and
    /// appends to the output sequence. With `last`, both groups are
    /// flushed.
    fn push_groups(&mut self, last: bool) {
        let input = std::mem::replace(&mut self.input, Step::empty(0));

        if !self.buffer.has_onset() {
            if !input.has_onset() {
                // two adjacent release groups merge
                self.buffer.delta += input.delta;
                self.buffer.events.extend(input.events);
                if last {
                    let merged = std::mem::replace(&mut self.buffer, Step::empty(0));
                    self.out.push(merged);
                }
                return;
            }

            // release group followed by an onset group: a release group
            // may never open the sequence, its events have nothing to
            // pair with
            let buffered = std::mem::replace(&mut self.buffer, Step::empty(0));
            if !self.out.is_empty() {
                self.out.push(buffered);
            } else if !buffered.is_empty() {
                log::warn!(
                    "discarding {} release event(s) with no preceding onset",
                    buffered.events.len()
                );
            }

            if last {
                self.out.push(input);
            } else {
                self.buffer = input;
            }
            return;
        }

        // the buffered group carries onsets
        let previous = std::mem::replace(&mut self.buffer, Step::empty(0));
        self.out.push(previous.clone());

        if input.has_onset() {
            // two adjacent onset groups need a release group between
            // them to keep the sequence alternating
            let mut input = input;
            let mut gap = Step::empty(input.delta);
            if self.options.detach_coincident_releases {
                move_matching_releases(&mut input, &previous, &mut gap);
            }
            let unfilled = gap.is_empty();
            self.out.push(gap);
            if self.options.reunite_displaced_releases && unfilled {
                self.open.push(OpenGroup {
                    onsets: previous,
                    slot: self.out.len() - 1,
                });
            }

            if last {
                self.out.push(input);
            } else {
                self.buffer = input;
            }
        } else if last {
            self.out.push(input);
        } else {
            self.buffer = input;
        }
    }

    fn finish(mut self) -> Vec<Step> {
        if self.options.reunite_displaced_releases {
            self.reunite();
        }
        let trailing_onsets = self.input.has_onset();
        self.push_groups(true);
        if trailing_onsets {
            // a final onset group still needs its release slot
            self.out.push(Step::empty(1));
        }
        shift_in_group_releases(&mut self.out);
        self.out
    }
}

/// Moves every release in `input` that closes an onset of `onsets` into
/// `dest`, preserving order. Returns whether anything moved.
fn move_matching_releases(input: &mut Step, onsets: &Step, dest: &mut Step) -> bool {
    let mut moved = false;
    for onset in onsets.events.iter().filter(|e| e.on) {
        let mut i = 0;
        while i < input.events.len() {
            if input.events[i].is_matching_release(onset) {
                dest.events.push(input.events.remove(i));
                moved = true;
            } else {
                i += 1;
            }
        }
    }
    moved
}

/// Within each group, moves a release in front of the matching onset
/// that precedes it in the same group.
fn shift_in_group_releases(groups: &mut [Step]) {
    for group in groups {
        let mut shifted: Vec<NoteEvent> = Vec::new();
        let mut others: Vec<NoteEvent> = Vec::new();
        for event in group.events.drain(..) {
            if others.iter().any(|o| o.on && event.is_matching_release(o)) {
                shifted.push(event);
            } else {
                others.push(event);
            }
        }
        shifted.extend(others);
        group.events = shifted;
    }
}

fn group_steps(steps: &[Step], options: &GroupingOptions) -> Vec<Step> {
    if steps.is_empty() {
        return Vec::new();
    }
    let mut grouper = Grouper::new(*options);
    for step in steps {
        for (i, event) in step.events.iter().enumerate() {
            let delta = if i == 0 { step.delta } else { 0 };
            grouper.push(delta, *event);
        }
    }
    grouper.finish()
}

/// Folds the alternating group sequence into step pairs. Leading
/// material without an onset cannot be paired and is dropped.
fn pair_up(groups: Vec<Step>) -> Vec<StepPair> {
    let mut iter = groups.into_iter().peekable();

    while let Some(step) = iter.peek() {
        if step.has_onset() {
            break;
        }
        let dropped = iter.next();
        if let Some(step) = dropped {
            if !step.is_empty() {
                log::warn!(
                    "discarding {} unpairable release event(s) at partition start",
                    step.events.len()
                );
            }
        }
    }

    let mut pairs = Vec::new();
    while let Some(onset) = iter.next() {
        let release = iter.next().unwrap_or_else(|| Step::empty(0));
        pairs.push(StepPair { onset, release });
    }
    pairs
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

    fn seal(events: &[(u64, NoteEvent)], options: GroupingOptions) -> Partition {
        let mut builder = StepBuilder::with_options(options);
        for (delta, event) in events {
            builder.push_event(*delta, *event);
        }
        builder.finalize()
    }

    #[test]
    fn test_single_note_pairs() {
        let partition = seal(
            &[(1, on(60)), (1, off(60))],
            GroupingOptions::default(),
        );
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.pairs()[0].onset.events, vec![on(60)]);
        assert_eq!(partition.pairs()[0].release.events, vec![off(60)]);
    }

    #[test]
    fn test_adjacent_onsets_get_empty_release_slot() {
        let partition = seal(
            &[(1, on(60)), (1, on(62)), (1, off(60)), (1, off(62))],
            GroupingOptions::default(),
        );
        // trailing single-note release steps merge into one batch
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.pairs()[0].onset.events, vec![on(60)]);
        assert!(partition.pairs()[0].release.is_empty());
        assert_eq!(partition.pairs()[1].onset.events, vec![on(62)]);
        assert_eq!(partition.pairs()[1].release.events, vec![off(60), off(62)]);
    }

    #[test]
    fn test_coincident_release_is_detached() {
        // off(40) is authored simultaneous with on(50) but closes the
        // previous group's onset
        let partition = seal(
            &[(1, on(40)), (2, on(50)), (0, off(40)), (3, off(50))],
            GroupingOptions::default(),
        );
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.pairs()[0].release.events, vec![off(40)]);
        assert_eq!(partition.pairs()[1].onset.events, vec![on(50)]);
        assert_eq!(partition.pairs()[1].release.events, vec![off(50)]);
    }

    #[test]
    fn test_coincident_release_kept_when_detach_disabled() {
        let options = GroupingOptions {
            detach_coincident_releases: false,
            ..GroupingOptions::default()
        };
        let partition = seal(
            &[(1, on(40)), (2, on(50)), (0, off(40)), (3, off(50))],
            options,
        );
        // off(40) rides along in the second onset group
        assert_eq!(partition.pairs()[0].release.events, vec![]);
        assert_eq!(partition.pairs()[1].onset.events, vec![on(50), off(40)]);
    }

    #[test]
    fn test_displaced_releases_left_in_place_by_default() {
        let partition = seal(
            &[(1, on(40)), (1, on(50)), (1, off(50)), (1, off(40))],
            GroupingOptions::default(),
        );
        assert_eq!(partition.len(), 2);
        assert!(partition.pairs()[0].release.is_empty());
        assert_eq!(partition.pairs()[1].release.events, vec![off(50), off(40)]);
    }

    #[test]
    fn test_displaced_releases_reunited_when_enabled() {
        let options = GroupingOptions {
            reunite_displaced_releases: true,
            ..GroupingOptions::default()
        };
        let partition = seal(
            &[(1, on(40)), (1, on(50)), (1, off(50)), (1, off(40))],
            options,
        );
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.pairs()[0].release.events, vec![off(40)]);
        assert_eq!(partition.pairs()[1].release.events, vec![off(50)]);
    }

    #[test]
    fn test_leading_releases_are_discarded() {
        let partition = seal(
            &[(0, off(55)), (1, off(56)), (1, on(60)), (1, off(60))],
            GroupingOptions::default(),
        );
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.pairs()[0].onset.events, vec![on(60)]);
        assert_eq!(partition.pairs()[0].release.events, vec![off(60)]);
        // raw steps keep the orphans
        assert_eq!(partition.steps()[0].events, vec![off(55)]);
    }

    #[test]
    fn test_release_only_partition_yields_no_pairs() {
        let partition = seal(&[(0, off(55)), (1, off(56))], GroupingOptions::default());
        assert!(partition.pairs().is_empty());
        assert_eq!(partition.steps().len(), 2);
    }

    #[test]
    fn test_zero_delta_retrigger_release_shifted_first() {
        // on(60) and its own off(60) land in one group; the off must
        // come out first or the retrigger would silence itself
        let partition = seal(
            &[(1, on(60)), (0, off(60))],
            GroupingOptions::default(),
        );
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.pairs()[0].onset.events, vec![off(60), on(60)]);
    }

    #[test]
    fn test_final_onset_group_gets_release_slot() {
        let partition = seal(&[(1, on(60))], GroupingOptions::default());
        assert_eq!(partition.len(), 1);
        assert!(partition.pairs()[0].release.is_empty());
    }
}
