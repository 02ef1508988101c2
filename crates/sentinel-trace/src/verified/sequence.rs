//! Pure transition logic for the sequence tracker.
//!
//! | Verified function            | Used by                                   |
//! |------------------------------|-------------------------------------------|
//! | [`classify_step`]            | `SequenceTracker::observe()`              |
//! | [`hole_ranges`]              | `SequenceTracker::observe()`, `finish()`  |
//! | [`take_from_ranges`]         | `SequenceTracker::observe()` (late ids)   |
//! | [`ranges_len`]               | `SequenceTracker` postconditions          |

use std::collections::{BTreeMap, BTreeSet};

/// Where an incoming id lies relative to the expected id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `id == expected`.
    InOrder,
    /// `expected < id <= expected + window`.
    Early { distance: u64 },
    /// `id > expected + window`; `span = id - expected` ids were skipped.
    Gap { span: u64 },
    /// `id < expected`.
    Late { distance: u64 },
}

/// Classify `id` against `expected` with a look-ahead of `window`.
///
/// # Properties
///
/// - Exactly one variant applies to every `(expected, id, window)`.
/// - With `window == 0` no id is ever `Early`.
pub fn classify_step(expected: u64, id: u64, window: u64) -> Step {
    let step = if id == expected {
        Step::InOrder
    } else if id < expected {
        Step::Late {
            distance: expected - id,
        }
    } else if id - expected <= window {
        Step::Early {
            distance: id - expected,
        }
    } else {
        Step::Gap {
            span: id - expected,
        }
    };

    debug_assert!(
        window > 0 || !matches!(step, Step::Early { .. }),
        "zero window never yields early ids"
    );
    step
}

/// Half-open ranges of ids in `[from, to)` that are not in `seen`.
///
/// # Properties
///
/// - Ranges are disjoint, non-empty and ascending.
/// - Total length equals `(to - from) - |seen ∩ [from, to)|`.
pub fn hole_ranges(from: u64, to: u64, seen: &BTreeSet<u64>) -> Vec<(u64, u64)> {
    debug_assert!(from <= to, "hole range must not be inverted");

    let mut holes = Vec::new();
    let mut cursor = from;
    for &id in seen.range(from..to) {
        if id > cursor {
            holes.push((cursor, id));
        }
        cursor = id + 1;
    }
    if cursor < to {
        holes.push((cursor, to));
    }

    debug_assert_eq!(
        holes.iter().map(|(a, b)| b - a).sum::<u64>(),
        (to - from) - seen.range(from..to).count() as u64,
        "holes plus seen ids must cover the span exactly"
    );
    holes
}

/// Remove `id` from a set of disjoint half-open ranges keyed by start.
///
/// Returns `true` when `id` was covered (and has now been removed).
pub fn take_from_ranges(ranges: &mut BTreeMap<u64, u64>, id: u64) -> bool {
    let before = ranges_len(ranges);

    let Some((&start, &end)) = ranges.range(..=id).next_back() else {
        return false;
    };
    if id >= end {
        return false;
    }
    ranges.remove(&start);
    if start < id {
        ranges.insert(start, id);
    }
    if id + 1 < end {
        ranges.insert(id + 1, end);
    }

    debug_assert_eq!(ranges_len(ranges) + 1, before, "exactly one id removed");
    true
}

/// Total number of ids covered by `ranges`.
pub fn ranges_len(ranges: &BTreeMap<u64, u64>) -> u64 {
    ranges.iter().map(|(start, end)| end - start).sum()
}

// ─── Tests ───────────────────────────────────────────────────────────
