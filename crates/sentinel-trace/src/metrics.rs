//! Latency statistics over decoded records.
//!
//! Only [`Opcode::TxEvent`] records carry latency samples; the other kinds
//! are counted by [`FlagCounts`] but never enter the distribution.

use crate::record::{Opcode, TraceFlags, TraceRecord};
use crate::verified::metrics::{mean, nearest_rank_index, sort_samples, Sample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("latency metrics requested on zero records")]
    EmptyInput,
}

// ═══════════════════════════════════════════════════════════════════════
//  Latency distribution
// ═══════════════════════════════════════════════════════════════════════

/// Summary of a latency distribution, in clock cycles.
///
/// Percentiles are order statistics, so `p50 <= p90 <= p99 <= p999`
/// always holds and every percentile is an observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub count: usize,
    pub min_cycles: u64,
    pub max_cycles: u64,
    pub mean_cycles: f64,
    pub p50_cycles: u64,
    pub p90_cycles: u64,
    pub p99_cycles: u64,
    pub p999_cycles: u64,
}

impl LatencyMetrics {
    /// Metrics over every record given, whatever its opcode.
    pub fn from_records(records: &[TraceRecord]) -> Result<Self, MetricsError> {
        Self::from_samples(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| (r.latency_cycles(), r.tx_id(), i))
                .collect(),
        )
    }

    pub fn from_samples(mut samples: Vec<Sample>) -> Result<Self, MetricsError> {
        if samples.is_empty() {
            return Err(MetricsError::EmptyInput);
        }
        sort_samples(&mut samples);

        let n = samples.len();
        let at = |per_mille: u32| samples[nearest_rank_index(per_mille, n)].0;
        let sum: u128 = samples.iter().map(|s| s.0 as u128).sum();

        let metrics = Self {
            count: n,
            min_cycles: samples[0].0,
            max_cycles: samples[n - 1].0,
            mean_cycles: mean(sum, n),
            p50_cycles: at(500),
            p90_cycles: at(900),
            p99_cycles: at(990),
            p999_cycles: at(999),
        };
        debug_assert!(metrics.percentiles_ordered());
        Ok(metrics)
    }

    /// Whether `min <= p50 <= p90 <= p99 <= p999 <= max`.
    pub fn percentiles_ordered(&self) -> bool {
        self.min_cycles <= self.p50_cycles
            && self.p50_cycles <= self.p90_cycles
            && self.p90_cycles <= self.p99_cycles
            && self.p99_cycles <= self.p999_cycles
            && self.p999_cycles <= self.max_cycles
    }

    /// The same summary in nanoseconds at `clock_mhz`.
    pub fn to_ns(&self, clock_mhz: f64) -> LatencyNs {
        LatencyNs {
            min: cycles_to_ns(self.min_cycles as f64, clock_mhz),
            max: cycles_to_ns(self.max_cycles as f64, clock_mhz),
            mean: cycles_to_ns(self.mean_cycles, clock_mhz),
            p50: cycles_to_ns(self.p50_cycles as f64, clock_mhz),
            p90: cycles_to_ns(self.p90_cycles as f64, clock_mhz),
            p99: cycles_to_ns(self.p99_cycles as f64, clock_mhz),
            p999: cycles_to_ns(self.p999_cycles as f64, clock_mhz),
        }
    }
}

impl fmt::Display for LatencyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} min={} p50={} p90={} p99={} p99.9={} max={} mean={:.2} (cycles)",
            self.count,
            self.min_cycles,
            self.p50_cycles,
            self.p90_cycles,
            self.p99_cycles,
            self.p999_cycles,
            self.max_cycles,
            self.mean_cycles,
        )
    }
}

/// Latency summary converted to nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyNs {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub p999: f64,
}

pub fn cycles_to_ns(cycles: f64, clock_mhz: f64) -> f64 {
    cycles * 1000.0 / clock_mhz
}

/// Metrics over the transaction records only.
pub fn compute_transaction_metrics(records: &[TraceRecord]) -> Result<LatencyMetrics, MetricsError> {
    LatencyMetrics::from_samples(
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_transaction())
            .map(|(i, r)| (r.latency_cycles(), r.tx_id(), i))
            .collect(),
    )
}

// ═══════════════════════════════════════════════════════════════════════
//  Flag and opcode counts
// ═══════════════════════════════════════════════════════════════════════

/// Per-flag and per-opcode record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub total: usize,
    pub core_errors: usize,
    pub trace_dropped: usize,
    pub inflight_underflows: usize,
    pub reorder_flagged: usize,
    pub resets: usize,
    pub kill_switch: usize,
    /// Sum of `meta` over `Overflow` records.
    pub overflow_traces_lost: u64,
    pub by_opcode: BTreeMap<String, usize>,
}

impl FlagCounts {
    pub fn from_records(records: &[TraceRecord]) -> Self {
        let mut counts = Self::default();
        for r in records {
            counts.total += 1;
            let flags = r.flags();
            counts.core_errors += usize::from(flags.contains(TraceFlags::CORE_ERROR));
            counts.trace_dropped += usize::from(flags.contains(TraceFlags::TRACE_DROPPED));
            counts.inflight_underflows += usize::from(flags.contains(TraceFlags::INFLIGHT_UNDER));
            counts.reorder_flagged += usize::from(flags.contains(TraceFlags::REORDER));
            counts.kill_switch += usize::from(flags.contains(TraceFlags::KILL_SWITCH));
            counts.resets += usize::from(r.is_reset());
            if r.opcode() == Opcode::Overflow {
                counts.overflow_traces_lost += u64::from(r.meta());
            }
            *counts.by_opcode.entry(r.opcode().name().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tx(id: u64, lat: u64) -> TraceRecord {
        TraceRecord::new(id, 1000, 1000 + lat, TraceFlags::NONE, Opcode::TxEvent, 0).unwrap()
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(LatencyMetrics::from_records(&[]), Err(MetricsError::EmptyInput));
        let heartbeat = TraceRecord::new(0, 5, 5, TraceFlags::NONE, Opcode::Heartbeat, 0).unwrap();
        assert_eq!(
            compute_transaction_metrics(&[heartbeat]),
            Err(MetricsError::EmptyInput)
        );
    }

    #[test]
    fn one_to_hundred() {
        let records: Vec<_> = (1..=100).rev().map(|lat| tx(lat, lat)).collect();
        let m = LatencyMetrics::from_records(&records).unwrap();
        assert_eq!(m.count, 100);
        assert_eq!(m.min_cycles, 1);
        assert_eq!(m.max_cycles, 100);
        assert_eq!(m.mean_cycles, 50.5);
        assert_eq!(m.p50_cycles, 50);
        assert_eq!(m.p90_cycles, 90);
        assert_eq!(m.p99_cycles, 99);
        assert_eq!(m.p999_cycles, 100);
    }

    #[test]
    fn single_record() {
        let m = LatencyMetrics::from_records(&[tx(0, 7)]).unwrap();
        assert_eq!((m.min_cycles, m.p50_cycles, m.p99_cycles, m.max_cycles), (7, 7, 7, 7));
    }

    #[test]
    fn only_transactions_count() {
        let mut records = vec![tx(0, 10), tx(1, 20)];
        records.push(TraceRecord::new(2, 0, 5000, TraceFlags::NONE, Opcode::ClockSync, 0).unwrap());
        let m = compute_transaction_metrics(&records).unwrap();
        assert_eq!(m.count, 2);
        assert_eq!(m.max_cycles, 20);
    }

    #[test]
    fn ns_conversion_at_100mhz() {
        let m = LatencyMetrics::from_records(&[tx(0, 10), tx(1, 30)]).unwrap();
        let ns = m.to_ns(100.0);
        assert_eq!(ns.min, 100.0);
        assert_eq!(ns.max, 300.0);
        assert_eq!(ns.mean, 200.0);
    }

    #[test]
    fn flag_counts() {
        let records = vec![
            TraceRecord::new(0, 0, 1, TraceFlags::CORE_ERROR, Opcode::TxEvent, 0).unwrap(),
            TraceRecord::new(1, 0, 1, TraceFlags::TRACE_DROPPED | TraceFlags::KILL_SWITCH, Opcode::TxEvent, 0)
                .unwrap(),
            TraceRecord::new(0, 2, 2, TraceFlags::NONE, Opcode::Overflow, 17).unwrap(),
            TraceRecord::new(0, 3, 3, TraceFlags::NONE, Opcode::Reset, 0).unwrap(),
        ];
        let c = FlagCounts::from_records(&records);
        assert_eq!(c.total, 4);
        assert_eq!(c.core_errors, 1);
        assert_eq!(c.trace_dropped, 1);
        assert_eq!(c.kill_switch, 1);
        assert_eq!(c.resets, 1);
        assert_eq!(c.overflow_traces_lost, 17);
        assert_eq!(c.by_opcode.get("TX_EVENT"), Some(&2));
        assert_eq!(c.by_opcode.get("OVERFLOW"), Some(&1));
    }

    #[test]
    fn json_field_names() {
        let m = LatencyMetrics::from_records(&[tx(0, 4), tx(1, 8)]).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["p99_cycles"], 8);
        assert_eq!(json["mean_cycles"], 6.0);
        let back: LatencyMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let flags = serde_json::to_value(FlagCounts::from_records(&[tx(0, 1)])).unwrap();
        assert_eq!(flags["by_opcode"]["TX_EVENT"], 1);
    }

    proptest! {
        #[test]
        fn percentiles_are_monotone(lats in proptest::collection::vec(0u64..1_000_000, 1..300)) {
            let records: Vec<_> = lats.iter().enumerate().map(|(i, &l)| tx(i as u64 % 7, l)).collect();
            let m = LatencyMetrics::from_records(&records).unwrap();
            prop_assert!(m.p50_cycles <= m.p90_cycles);
            prop_assert!(m.p90_cycles <= m.p99_cycles);
            prop_assert!(m.percentiles_ordered());
            prop_assert_eq!(m.count, lats.len());
        }

        #[test]
        fn input_order_does_not_matter(mut lats in proptest::collection::vec(0u64..1000, 1..100)) {
            let forward: Vec<_> = lats.iter().map(|&l| tx(0, l)).collect();
            lats.reverse();
            let backward: Vec<_> = lats.iter().map(|&l| tx(0, l)).collect();
            let a = LatencyMetrics::from_records(&forward).unwrap();
            let b = LatencyMetrics::from_records(&backward).unwrap();
            prop_assert_eq!(a.p50_cycles, b.p50_cycles);
            prop_assert_eq!(a.p99_cycles, b.p99_cycles);
        }
    }
}
