//! Record-level transaction sequence reconciliation.
//!
//! ```text
//!            reset marker                   first tx of new epoch
//!   NORMAL ───────────────▶ POST_RESET ───────────────────────────▶ NORMAL
//!     ▲                        │
//!     └── reset marker ◀───────┘   (expected = 0, holes discarded)
//! ```
//!
//! The tracker consumes records in emission order and classifies every
//! transaction id exactly once. Ids that arrive ahead of `expected` but
//! within the look-ahead window are held as *reordered* rather than
//! counted as drops. A gap that later turns out to have been a reorder
//! (the id arrives late) is moved out of the drop count and recorded as a
//! *false drop*. Resets start a new epoch and never count as loss.
//!
//! The first epoch is anchored at the first transaction id seen, so a
//! trace that starts mid-stream reports no loss below it. Epochs opened by
//! a reset start at id 0. `u64::MAX` is a terminal id: once it has been
//! consumed in order nothing can follow it, and a repeat is a duplicate.
//!
//! The look-ahead window bounds id distance, not arrival position: an id
//! is held as reordered only while it is at most `window` above the lowest
//! id not yet seen.

use crate::counters::SimCounters;
use crate::record::TraceRecord;
use crate::verified::sequence::{classify_step, hole_ranges, ranges_len, take_from_ranges, Step};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Normal,
    PostReset,
}

/// Outcome of feeding one record to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    InOrder,
    /// Arrived ahead of `expected` within the window, or behind it.
    Reordered { distance: u64, late: bool },
    /// Closed the window over `missing` ids that never arrived.
    Dropped { missing: u64 },
    /// Late arrival of an id previously counted as dropped.
    Recovered,
    /// Same id already held in the look-ahead window.
    Duplicate,
    /// Standalone reset marker.
    Reset,
    /// Heartbeat, clock-sync and overflow records.
    Ignored,
}

/// Final tally of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub transactions: u64,
    pub in_order: u64,
    pub reordered: u64,
    /// Net drops after recovering late arrivals.
    pub dropped: u64,
    /// Ids first counted as dropped that arrived later.
    pub false_drops: u64,
    pub duplicates: u64,
    pub resets: u64,
    /// Number of epochs seen (1 + resets).
    pub epochs: u64,
    pub max_reorder_distance: u64,
    pub window: u64,
}

impl SequenceSummary {
    pub fn reorder_detected(&self) -> bool {
        self.reordered > 0
    }
}

impl fmt::Display for SequenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tx: {} in-order, {} reordered (max distance {}), {} dropped, {} false drops, {} duplicates, {} resets",
            self.transactions,
            self.in_order,
            self.reordered,
            self.max_reorder_distance,
            self.dropped,
            self.false_drops,
            self.duplicates,
            self.resets,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tracker
// ═══════════════════════════════════════════════════════════════════════

/// Per-run sequence state machine.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    window: u64,
    state: TrackerState,
    expected: u64,
    /// `expected` has not been set by a transaction or reset yet.
    unanchored: bool,
    /// `u64::MAX` was consumed in order; no id is expected any more.
    exhausted: bool,
    /// Ids seen ahead of `expected`, all within `(expected, expected + window]`.
    pending: BTreeSet<u64>,
    /// Ids counted as dropped in the current epoch, as half-open ranges.
    dropped_ranges: BTreeMap<u64, u64>,
    summary: SequenceSummary,
}

impl SequenceTracker {
    /// Tracker with a look-ahead window of `window` ids (0 = strict order).
    pub fn new(window: u64) -> Self {
        Self {
            window,
            state: TrackerState::Normal,
            expected: 0,
            unanchored: true,
            exhausted: false,
            pending: BTreeSet::new(),
            dropped_ranges: BTreeMap::new(),
            summary: SequenceSummary {
                epochs: 1,
                window,
                ..SequenceSummary::default()
            },
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn summary(&self) -> &SequenceSummary {
        &self.summary
    }

    /// Classify one record in emission order.
    pub fn observe(&mut self, record: &TraceRecord) -> Classification {
        if record.is_reset() {
            self.handle_reset();
            if !record.is_transaction() {
                return Classification::Reset;
            }
        } else if !record.is_transaction() {
            return Classification::Ignored;
        }

        self.summary.transactions += 1;
        self.state = TrackerState::Normal;
        if self.unanchored {
            self.unanchored = false;
            self.expected = record.tx_id();
        }
        self.classify(record.tx_id())
    }

    /// Feed every record and return the closed summary.
    pub fn track_all<'a>(
        window: u64,
        records: impl IntoIterator<Item = &'a TraceRecord>,
    ) -> SequenceSummary {
        let mut tracker = Self::new(window);
        for record in records {
            tracker.observe(record);
        }
        tracker.finish()
    }

    /// Start a new epoch. Outstanding holes are discarded, not counted.
    pub fn handle_reset(&mut self) {
        debug!(
            "reset at expected tx_id {} ({} pending discarded)",
            self.expected,
            self.pending.len()
        );
        self.summary.resets += 1;
        self.summary.epochs += 1;
        self.state = TrackerState::PostReset;
        self.expected = 0;
        self.unanchored = false;
        self.exhausted = false;
        self.pending.clear();
        self.dropped_ranges.clear();
    }

    /// Move `expected` past `id`.
    fn advance_past(&mut self, id: u64) {
        match id.checked_add(1) {
            Some(next) => self.expected = next,
            None => {
                self.expected = u64::MAX;
                self.exhausted = true;
            }
        }
    }

    fn classify(&mut self, id: u64) -> Classification {
        if self.exhausted && id == u64::MAX {
            self.summary.duplicates += 1;
            return Classification::Duplicate;
        }
        match classify_step(self.expected, id, self.window) {
            Step::InOrder => {
                self.summary.in_order += 1;
                self.advance_past(id);
                while !self.exhausted && self.pending.remove(&self.expected) {
                    self.advance_past(self.expected);
                }
                Classification::InOrder
            }
            Step::Early { distance } => {
                if !self.pending.insert(id) {
                    self.summary.duplicates += 1;
                    return Classification::Duplicate;
                }
                self.note_reorder(distance);
                Classification::Reordered {
                    distance,
                    late: false,
                }
            }
            Step::Gap { .. } => {
                let missing = self.close_window(id);
                self.advance_past(id);
                Classification::Dropped { missing }
            }
            Step::Late { distance } => {
                if take_from_ranges(&mut self.dropped_ranges, id) {
                    self.summary.dropped -= 1;
                    self.summary.false_drops += 1;
                    self.note_reorder(distance);
                    Classification::Recovered
                } else {
                    self.note_reorder(distance);
                    Classification::Reordered {
                        distance,
                        late: true,
                    }
                }
            }
        }
    }

    /// Count every id in `[expected, upto)` not held in `pending` as
    /// dropped, then clear `pending`.
    fn close_window(&mut self, upto: u64) -> u64 {
        let holes = hole_ranges(self.expected, upto, &self.pending);
        let before = ranges_len(&self.dropped_ranges);
        let mut missing = 0;
        for (start, end) in holes {
            missing += end - start;
            self.dropped_ranges.insert(start, end);
        }
        self.pending.clear();
        // Saturates across epochs; each epoch alone fits in u64.
        self.summary.dropped = self.summary.dropped.saturating_add(missing);

        debug_assert_eq!(ranges_len(&self.dropped_ranges), before + missing);
        missing
    }

    fn note_reorder(&mut self, distance: u64) {
        self.summary.reordered += 1;
        self.summary.max_reorder_distance = self.summary.max_reorder_distance.max(distance);
    }

    /// Close the window and return the final tally.
    ///
    /// Holes below the highest id still pending are drops; ids past the
    /// last one seen are unknowable and are not counted.
    pub fn finish(mut self) -> SequenceSummary {
        // `highest` itself was seen, so holes end just below it.
        if let Some(&highest) = self.pending.iter().next_back() {
            self.close_window(highest);
        }
        self.summary
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Counter reconciliation
// ═══════════════════════════════════════════════════════════════════════

/// Simulator-reported drops disagree with the record-level drop count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMismatch {
    pub reported: u64,
    pub derived: u64,
    pub tolerance: u64,
}

impl fmt::Display for CounterMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulator reported {} trace drops, records show {} (tolerance {})",
            self.reported, self.derived, self.tolerance
        )
    }
}

/// Compare the tracker's drop count with the simulator's `Trace drops`.
///
/// Absent counters reconcile trivially.
pub fn reconcile(
    summary: &SequenceSummary,
    counters: &SimCounters,
    tolerance: u64,
) -> Option<CounterMismatch> {
    let reported = counters.trace_drops?;
    if reported.abs_diff(summary.dropped) > tolerance {
        Some(CounterMismatch {
            reported,
            derived: summary.dropped,
            tolerance,
        })
    } else {
        None
    }
}
