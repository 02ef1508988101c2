//! Pure order-statistic helpers for the metrics engine.
//!
//! Percentile convention: nearest rank on the latency sequence sorted by
//! `(latency, tx_id, emission index)`. Rank `r` (in per-mille, so p99.9 is
//! representable without floats) selects the element at
//! `max(ceil(r * N / 1000), 1) - 1`.
//!
//! | Verified function            | Used by                                   |
//! |------------------------------|-------------------------------------------|
//! | [`nearest_rank_index`]       | `LatencyMetrics::from_samples()`          |
//! | [`sort_samples`]             | `LatencyMetrics::from_samples()`          |
//! | [`mean`]                     | `LatencyMetrics::from_samples()`          |

/// One latency observation: `(latency_cycles, tx_id, emission_index)`.
pub type Sample = (u64, u64, usize);

/// Index of the nearest-rank order statistic for `per_mille` over `n`
/// sorted samples.
///
/// # Properties
///
/// - `n > 0` and `per_mille <= 1000` (preconditions).
/// - Result is `< n`.
/// - Monotone: `a <= b` implies `index(a, n) <= index(b, n)`.
pub fn nearest_rank_index(per_mille: u32, n: usize) -> usize {
    debug_assert!(n > 0, "nearest_rank_index requires a non-empty sequence");
    debug_assert!(per_mille <= 1000, "rank must be at most 100%");

    let scaled = per_mille as u128 * n as u128;
    let rank = scaled.div_ceil(1000).max(1) as usize;
    let index = rank - 1;

    debug_assert!(index < n, "index {index} out of range for {n} samples");
    index
}

/// Sort samples into the canonical order used for percentile selection.
///
/// Ties on latency are broken by `tx_id`, then by emission index, so the
/// result is a total order independent of the input permutation.
pub fn sort_samples(samples: &mut [Sample]) {
    samples.sort_unstable();

    debug_assert!(
        samples.windows(2).all(|w| w[0] <= w[1]),
        "samples must be sorted"
    );
}

/// Arithmetic mean of `n` values summing to `sum`.
pub fn mean(sum: u128, n: usize) -> f64 {
    debug_assert!(n > 0, "mean of an empty set");
    sum as f64 / n as f64
}

// ─── Tests ───────────────────────────────────────────────────────────
