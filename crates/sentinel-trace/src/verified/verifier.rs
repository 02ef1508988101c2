//! Pure, verifiable functions for determinism verification.
//!
//! Every function in this module is:
//! - **Pure**: no I/O, no side effects beyond the return value.
//! - **Deterministic**: same inputs always produce the same outputs.
//! - **Assertion-guarded**: `debug_assert!` preconditions and postconditions
//!   on every non-trivial function.
//!
//! # Mapping to `verifier.rs`
//!
//! | Verified function            | Caller in `verifier.rs`                   |
//! |------------------------------|-------------------------------------------|
//! | [`describe_divergence`]      | `DeterminismVerifier::compare_records()`  |
//! | [`find_first_divergence`]    | `DeterminismVerifier::compare_records()`  |

use crate::record::TraceRecord;

// ─── Divergence description ─────────────────────────────────────────

/// Produce a human-readable description of how two records differ.
///
/// Fields are checked in wire order, so the message names the first
/// field that disagrees.
///
/// # Properties
///
/// - Always returns a non-empty string.
/// - If the opcodes differ, the message mentions "opcode mismatch".
pub fn describe_divergence(a: &TraceRecord, b: &TraceRecord) -> String {
    let result = if a.opcode() != b.opcode() {
        format!("Record opcode mismatch: A={}, B={}", a.opcode(), b.opcode())
    } else if a.tx_id() != b.tx_id() {
        format!("tx_id differs: A={}, B={}", a.tx_id(), b.tx_id())
    } else if a.t_ingress() != b.t_ingress() {
        format!(
            "t_ingress differs for tx {}: A={}, B={}",
            a.tx_id(),
            a.t_ingress(),
            b.t_ingress()
        )
    } else if a.t_egress() != b.t_egress() {
        format!(
            "t_egress differs for tx {}: A={}, B={} (latency {} vs {})",
            a.tx_id(),
            a.t_egress(),
            b.t_egress(),
            a.latency_cycles(),
            b.latency_cycles()
        )
    } else if a.flags() != b.flags() {
        format!("Flags differ for tx {}: A={}, B={}", a.tx_id(), a.flags(), b.flags())
    } else if a.meta() != b.meta() {
        format!(
            "meta differs for tx {}: A={:#x}, B={:#x}",
            a.tx_id(),
            a.meta(),
            b.meta()
        )
    } else {
        format!("Records identical ({} tx {})", a.opcode(), a.tx_id())
    };

    debug_assert!(
        !result.is_empty(),
        "describe_divergence must return non-empty string"
    );
    result
}

// ─── First divergence finder ────────────────────────────────────────

/// Find the first index at which two record slices diverge.
///
/// Returns `None` if the slices are equal. When the slices match
/// element-wise but have different lengths, the divergence index is
/// `min(a.len(), b.len())` and the description mentions the length
/// mismatch.
///
/// # Properties
///
/// - Returns `None` iff the slices are identical.
/// - `index <= min(a.len(), b.len())`.
/// - All records before `index` are equal.
pub fn find_first_divergence(
    records_a: &[TraceRecord],
    records_b: &[TraceRecord],
) -> Option<(usize, String)> {
    let min_len = records_a.len().min(records_b.len());

    if let Some(i) = (0..min_len).find(|&i| records_a[i] != records_b[i]) {
        // Postcondition: all prior records are equal.
        debug_assert!(
            records_a[..i] == records_b[..i],
            "all records before divergence must be equal"
        );
        return Some((i, describe_divergence(&records_a[i], &records_b[i])));
    }

    if records_a.len() != records_b.len() {
        let description = format!(
            "Trace length mismatch: A has {} records, B has {} records (delta: {})",
            records_a.len(),
            records_b.len(),
            records_a.len() as i64 - records_b.len() as i64,
        );
        return Some((min_len, description));
    }

    debug_assert!(records_a == records_b);
    None
}

// ─── Tests ───────────────────────────────────────────────────────────
