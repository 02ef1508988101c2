//! Fault results: everything measured from one simulator run.
//!
//! The simulator is the source of truth for counters; the functions here
//! only decode, reconcile and compare. Derivation proceeds as:
//!
//! ```text
//!  trace bytes ──decode (best effort)──▶ records ──┬─▶ SequenceTracker ──┐
//!                                                  ├─▶ LatencyMetrics    ├─▶ Measurements ──validate──▶ Verdict
//!  stdout ──SimCounters::parse─────────▶ counters ─┴─▶ reconcile ────────┘
//! ```
//!
//! A [`FaultResult`] is built once and never mutated. A failed contract is
//! recorded in its [`Verdict`], not raised as an error.

use crate::config::HarnessConfig;
use crate::contract::{Measurements, Verdict};
use crate::scenario::FaultScenario;
use crate::simulator::SimulationOutput;
use log::{debug, info, warn};
use sentinel_trace::counters::SimCounters;
use sentinel_trace::decode::{decode, DecodeMode, DecodedTrace};
use sentinel_trace::metrics::{compute_transaction_metrics, FlagCounts, LatencyMetrics};
use sentinel_trace::record::TraceRecord;
use sentinel_trace::sequence::{reconcile, CounterMismatch, SequenceSummary, SequenceTracker};
use sentinel_trace::verifier::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Measured outcome of one scenario run plus its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultResult {
    pub scenario: FaultScenario,
    pub seed: u64,
    /// Simulator plusargs, trace location excluded.
    pub program: Vec<String>,
    pub clock_mhz: f64,
    pub measurements: Measurements,
    pub verdict: Verdict,
    pub counters: SimCounters,
    /// Latency over all transactions, absent when there were none.
    pub metrics: Option<LatencyMetrics>,
    pub sequence: SequenceSummary,
    pub flags: FlagCounts,
    pub trace_sha256: String,
    pub trace_bytes: usize,
    pub trace_records: usize,
    /// Where best-effort decoding stopped, if it did.
    pub corruption: Option<String>,
    pub counter_mismatch: Option<CounterMismatch>,
}

impl FaultResult {
    /// Derive and validate a result from raw simulator output.
    pub fn from_run(
        scenario: &FaultScenario,
        seed: u64,
        output: &SimulationOutput,
        config: &HarnessConfig,
    ) -> Self {
        let trace = match decode(&output.trace, DecodeMode::BestEffort) {
            Ok(trace) => trace,
            Err(partial) => DecodedTrace {
                corruption: Some(partial.error),
                ..partial.prefix
            },
        };
        let counters = SimCounters::parse(&output.stdout);
        for w in &counters.warnings {
            warn!("[{}] counter report: {w}", scenario.name);
        }

        let sequence = SequenceTracker::track_all(scenario.reorder_window(), &trace.records);
        let counter_mismatch = reconcile(&sequence, &counters, config.drop_tolerance);
        let metrics = compute_transaction_metrics(&trace.records).ok();
        debug!("[{}] {}", scenario.name, sequence);

        let mut findings = Vec::new();
        if let Some(ref corruption) = trace.corruption {
            findings.push(format!("decode stopped early: {corruption}"));
        }
        if let Some((declared, decoded)) = trace.count_mismatch() {
            findings.push(format!("header declares {declared} records, decoded {decoded}"));
        }
        if let Some(ref mismatch) = counter_mismatch {
            warn!("[{}] {mismatch}", scenario.name);
            findings.push(mismatch.to_string());
        }
        if metrics.as_ref().is_some_and(|m| !m.percentiles_ordered()) {
            findings.push("latency percentiles out of order".to_string());
        }

        let split = LatencySplit::compute(scenario, &trace.records, config.clock_mhz);
        let transactions = trace.records.iter().filter(|r| r.is_transaction()).count() as u64;

        let measurements = Measurements {
            transactions_completed: counters.transactions_received.unwrap_or(transactions),
            drop_count: sequence.dropped,
            false_drops: sequence.false_drops,
            kill_switch_triggered: counters.kill_switch_triggered.unwrap_or(false)
                || trace.records.iter().any(TraceRecord::kill_switch),
            max_latency_spike: split.spike(),
            baseline_p99_ns: split.baseline_p99_ns.unwrap_or(0.0),
            fault_p99_ns: split.fault_p99_ns.unwrap_or(0.0),
            reorder_detected: sequence.reorder_detected(),
            reset_handled: sequence.resets > 0 && sequence.false_drops == 0,
            metrics_uncorrupted: findings.is_empty(),
            integrity_findings: findings,
        };
        let verdict = scenario.expected.validate(&measurements);
        info!("[{}] seed={seed:#x} verdict: {verdict}", scenario.name);

        let program = scenario
            .program(seed)
            .args()
            .into_iter()
            .filter(|a| !a.starts_with("+trace_file="))
            .collect();

        Self {
            scenario: scenario.clone(),
            seed,
            program,
            clock_mhz: config.clock_mhz,
            measurements,
            verdict,
            counters,
            metrics,
            flags: FlagCounts::from_records(&trace.records),
            sequence,
            trace_sha256: sha256_hex(&output.trace),
            trace_bytes: output.trace.len(),
            trace_records: trace.records.len(),
            corruption: trace.corruption.map(|c| c.to_string()),
            counter_mismatch,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    pub fn errors(&self) -> Vec<String> {
        self.verdict.errors()
    }

    /// Evaluate the stored measurements against the stored contract again.
    pub fn revalidate(&self) -> Verdict {
        self.scenario.expected.validate(&self.measurements)
    }
}

impl fmt::Display for FaultResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.measurements;
        write!(
            f,
            "{}: {} (tx={}, drops={}, false drops={}, kill switch={}, spike={:.2}x)",
            self.scenario.name,
            if self.passed() { "PASS" } else { "FAIL" },
            m.transactions_completed,
            m.drop_count,
            m.false_drops,
            m.kill_switch_triggered,
            m.max_latency_spike,
        )
    }
}

/// p99 of transactions issued inside vs outside any fault window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LatencySplit {
    baseline_p99_ns: Option<f64>,
    fault_p99_ns: Option<f64>,
}

impl LatencySplit {
    fn compute(scenario: &FaultScenario, records: &[TraceRecord], clock_mhz: f64) -> Self {
        let (fault, baseline): (Vec<TraceRecord>, Vec<TraceRecord>) = records
            .iter()
            .filter(|r| r.is_transaction())
            .cloned()
            .partition(|r| scenario.under_fault(r.t_ingress()));
        let p99 = |set: &[TraceRecord]| {
            compute_transaction_metrics(set)
                .ok()
                .map(|m| m.to_ns(clock_mhz).p99)
        };
        Self {
            baseline_p99_ns: p99(&baseline),
            fault_p99_ns: p99(&fault),
        }
    }

    /// Fault p99 over baseline p99; 1.0 when either side is missing.
    fn spike(&self) -> f64 {
        match (self.baseline_p99_ns, self.fault_p99_ns) {
            (Some(base), Some(fault)) if base > 0.0 => fault / base,
            _ => 1.0,
        }
    }
}
