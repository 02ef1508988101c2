//! Determinism verification by comparing two raw trace files.
//!
//! For a fixed `(seed, fault program, transaction count)` the simulator
//! must produce byte-identical output. The [`DeterminismVerifier`] checks
//! this by content hash and, when the hashes differ, decodes both streams
//! and locates the first diverging record.

use crate::decode::{decode, DecodeMode, DecodedTrace};
use crate::record::TraceRecord;
use crate::verified::verifier::find_first_divergence;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ═══════════════════════════════════════════════════════════════════════
//  Divergence
// ═══════════════════════════════════════════════════════════════════════

/// A point where two traces diverged.
#[derive(Debug, Clone, Serialize)]
pub struct Divergence {
    /// Index in the record stream where divergence occurred.
    pub record_index: usize,
    /// Description of what differs.
    pub description: String,
    /// Record from trace A at the divergence point.
    pub trace_a_record: Option<TraceRecord>,
    /// Record from trace B at the divergence point.
    pub trace_b_record: Option<TraceRecord>,
    /// A few records before the divergence for context.
    pub context_before: Vec<TraceRecord>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DIVERGENCE at record index {}:", self.record_index)?;
        writeln!(f, "  {}", self.description)?;

        match self.trace_a_record {
            Some(ref a) => writeln!(f, "  Trace A: {}", a)?,
            None => writeln!(f, "  Trace A: <ended>")?,
        }
        match self.trace_b_record {
            Some(ref b) => writeln!(f, "  Trace B: {}", b)?,
            None => writeln!(f, "  Trace B: <ended>")?,
        }

        if !self.context_before.is_empty() {
            writeln!(f, "  Context (common prefix):")?;
            let first = self.record_index - self.context_before.len();
            for (i, record) in self.context_before.iter().enumerate() {
                writeln!(f, "    [{:>6}] {}", first + i, record)?;
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Verification result
// ═══════════════════════════════════════════════════════════════════════

/// Result of comparing two traces.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Whether the raw bytes are identical.
    pub is_deterministic: bool,
    pub digest_a: String,
    pub digest_b: String,
    pub trace_a_len: usize,
    pub trace_b_len: usize,
    /// Number of leading records that matched.
    pub matching_records: usize,
    /// First divergence (if any).
    pub first_divergence: Option<Divergence>,
    pub trace_a_summary: BTreeMap<String, usize>,
    pub trace_b_summary: BTreeMap<String, usize>,
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_deterministic {
            writeln!(
                f,
                "✅ DETERMINISTIC: {} records matched, sha256 {}",
                self.matching_records, self.digest_a
            )?;
        } else {
            writeln!(f, "❌ NON-DETERMINISTIC")?;
            writeln!(f, "   A: {} records, sha256 {}", self.trace_a_len, self.digest_a)?;
            writeln!(f, "   B: {} records, sha256 {}", self.trace_b_len, self.digest_b)?;
            writeln!(
                f,
                "   Matched {} records before divergence",
                self.matching_records
            )?;
        }

        if let Some(ref div) = self.first_divergence {
            writeln!(f)?;
            write!(f, "{}", div)?;
        }

        writeln!(f, "\nOpcode summary:")?;
        let mut all: Vec<&String> = self
            .trace_a_summary
            .keys()
            .chain(self.trace_b_summary.keys())
            .collect();
        all.sort();
        all.dedup();

        writeln!(f, "  {:>12} {:>10} {:>10} {:>10}", "Opcode", "Trace A", "Trace B", "Delta")?;
        for op in all {
            let a = self.trace_a_summary.get(op).copied().unwrap_or(0);
            let b = self.trace_b_summary.get(op).copied().unwrap_or(0);
            let delta = b as i64 - a as i64;
            let marker = if delta != 0 { " ⚠" } else { "" };
            writeln!(f, "  {:>12} {:>10} {:>10} {:>+10}{}", op, a, b, delta, marker)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Verifier
// ═══════════════════════════════════════════════════════════════════════

/// Compares two trace files for byte-level determinism.
pub struct DeterminismVerifier;

impl DeterminismVerifier {
    const CONTEXT_WINDOW: usize = 5;

    /// Compare two raw trace streams.
    pub fn compare(bytes_a: &[u8], bytes_b: &[u8]) -> VerificationResult {
        let digest_a = sha256_hex(bytes_a);
        let digest_b = sha256_hex(bytes_b);
        // Best-effort: a corrupt suffix still lets us compare the prefix.
        let trace_a = decode(bytes_a, DecodeMode::BestEffort).unwrap_or_else(|e| e.prefix);
        let trace_b = decode(bytes_b, DecodeMode::BestEffort).unwrap_or_else(|e| e.prefix);
        Self::compare_records(digest_a, digest_b, &trace_a, &trace_b)
    }

    fn compare_records(
        digest_a: String,
        digest_b: String,
        trace_a: &DecodedTrace,
        trace_b: &DecodedTrace,
    ) -> VerificationResult {
        let (a, b) = (&trace_a.records, &trace_b.records);
        let is_deterministic = digest_a == digest_b;

        let first_divergence = if is_deterministic {
            None
        } else {
            let (index, description) = find_first_divergence(a, b).unwrap_or_else(|| {
                (
                    a.len(),
                    "Record streams identical; file header or trailing bytes differ".to_string(),
                )
            });
            let context_start = index.saturating_sub(Self::CONTEXT_WINDOW);
            Some(Divergence {
                record_index: index,
                description,
                trace_a_record: a.get(index).cloned(),
                trace_b_record: b.get(index).cloned(),
                context_before: a[context_start..index.min(a.len())].to_vec(),
            })
        };

        let matching_records = first_divergence
            .as_ref()
            .map_or(a.len(), |d| d.record_index);

        VerificationResult {
            is_deterministic,
            digest_a,
            digest_b,
            trace_a_len: a.len(),
            trace_b_len: b.len(),
            matching_records,
            first_divergence,
            trace_a_summary: opcode_summary(a),
            trace_b_summary: opcode_summary(b),
        }
    }
}

fn opcode_summary(records: &[TraceRecord]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for r in records {
        *summary.entry(r.opcode().name().to_string()).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::encode;
    use crate::header::FileHeader;
    use crate::record::{Opcode, TraceFlags};

    fn stream(n: u64, skew_at: Option<u64>) -> Vec<u8> {
        let records: Vec<_> = (0..n)
            .map(|i| {
                let lat = if Some(i) == skew_at { 99 } else { 4 };
                TraceRecord::new(i, i * 10, i * 10 + lat, TraceFlags::NONE, Opcode::TxEvent, 0).unwrap()
            })
            .collect();
        encode(None, &records)
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_streams_are_deterministic() {
        let a = stream(20, None);
        let result = DeterminismVerifier::compare(&a, &a.clone());
        assert!(result.is_deterministic);
        assert_eq!(result.matching_records, 20);
        assert!(result.first_divergence.is_none());
        assert_eq!(result.digest_a, result.digest_b);
    }

    #[test]
    fn divergence_located_with_context() {
        let result = DeterminismVerifier::compare(&stream(20, None), &stream(20, Some(12)));
        assert!(!result.is_deterministic);
        assert_eq!(result.matching_records, 12);
        let div = result.first_divergence.unwrap();
        assert_eq!(div.record_index, 12);
        assert_eq!(div.context_before.len(), 5);
        assert!(div.description.contains("t_egress"));
    }

    #[test]
    fn truncated_trace_diverges_at_end() {
        let result = DeterminismVerifier::compare(&stream(10, None), &stream(7, None));
        let div = result.first_divergence.unwrap();
        assert_eq!(div.record_index, 7);
        assert!(div.trace_a_record.is_some());
        assert!(div.trace_b_record.is_none());
    }

    #[test]
    fn header_only_difference_is_still_nondeterministic() {
        let body = stream(3, None);
        let mut a = FileHeader { run_id: 1, ..FileHeader::default() }.to_bytes().to_vec();
        let mut b = FileHeader { run_id: 2, ..FileHeader::default() }.to_bytes().to_vec();
        a.extend_from_slice(&body);
        b.extend_from_slice(&body);
        let result = DeterminismVerifier::compare(&a, &b);
        assert!(!result.is_deterministic);
        let div = result.first_divergence.unwrap();
        assert_eq!(div.record_index, 3);
        assert!(div.description.contains("header"));
    }

    #[test]
    fn display_mentions_verdict() {
        let a = stream(2, None);
        let text = DeterminismVerifier::compare(&a, &a).to_string();
        assert!(text.contains("DETERMINISTIC"));
        assert!(text.contains("TX_EVENT"));
    }
}
