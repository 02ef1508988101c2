//! Structured incident report built from a fault result.

use sentinel_fault::contract::Violation;
use sentinel_fault::result::FaultResult;
use sentinel_trace::counters::SimCounters;
use sentinel_trace::metrics::{FlagCounts, LatencyMetrics, LatencyNs};
use sentinel_trace::sequence::SequenceSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity classification of a run.
///
/// Ordered from least to most severe; a report takes the worst severity
/// among its violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Contract held.
    Info,
    /// Fewer drops than the fault should have caused.
    Low,
    /// Latency or reorder-detection expectation missed.
    Medium,
    /// Loss, false drops or an unexpected halt.
    High,
    /// The kill switch failed to latch, or the measurements themselves are untrustworthy.
    Critical,
}

impl Severity {
    pub fn of(violation: &Violation) -> Self {
        match violation {
            Violation::TooFewDrops { .. } => Severity::Low,
            Violation::LatencySpike { .. } | Violation::ReorderNotDetected => Severity::Medium,
            Violation::TooManyDrops { .. }
            | Violation::KillSwitchUnexpected
            | Violation::ResetNotHandled { .. }
            | Violation::TooManyFalseDrops { .. } => Severity::High,
            Violation::KillSwitchNotTriggered | Violation::MetricsCorrupted { .. } => {
                Severity::Critical
            }
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Headline figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub transactions: u64,
    pub drops: u64,
    pub false_drops: u64,
    pub kill_switch: bool,
    /// Formatted as `"3.0x"`.
    pub latency_spike: String,
    pub p99_baseline_ns: f64,
    pub p99_fault_ns: f64,
    pub reorder_detected: bool,
    pub reset_handled: bool,
    pub metrics_uncorrupted: bool,
}

/// How to rerun the exact same simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reproduction {
    pub scenario: String,
    pub seed: u64,
    pub plusargs: Vec<String>,
    pub trace_sha256: String,
}

/// The content of `report.json`; `report.md` mirrors it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub scenario: String,
    pub version: String,
    pub description: String,
    pub result: String,
    pub severity: Severity,
    pub errors: Vec<String>,
    pub metrics: ReportMetrics,
    pub faults: Vec<String>,
    pub latency_cycles: Option<LatencyMetrics>,
    pub latency_ns: Option<LatencyNs>,
    pub sequence: SequenceSummary,
    pub counters: SimCounters,
    pub flags: FlagCounts,
    pub integrity_findings: Vec<String>,
    pub reproduction: Reproduction,
}

impl IncidentReport {
    pub fn from_result(result: &FaultResult) -> Self {
        let m = &result.measurements;
        let severity = result
            .verdict
            .violations
            .iter()
            .map(Severity::of)
            .max()
            .unwrap_or(Severity::Info);

        Self {
            scenario: result.scenario.name.clone(),
            version: result.scenario.version.clone(),
            description: result.scenario.description.clone(),
            result: if result.passed() { "PASS" } else { "FAIL" }.to_string(),
            severity,
            errors: result.errors(),
            metrics: ReportMetrics {
                transactions: m.transactions_completed,
                drops: m.drop_count,
                false_drops: m.false_drops,
                kill_switch: m.kill_switch_triggered,
                latency_spike: format!("{:.1}x", m.max_latency_spike),
                p99_baseline_ns: m.baseline_p99_ns,
                p99_fault_ns: m.fault_p99_ns,
                reorder_detected: m.reorder_detected,
                reset_handled: m.reset_handled,
                metrics_uncorrupted: m.metrics_uncorrupted,
            },
            faults: result.scenario.faults.iter().map(ToString::to_string).collect(),
            latency_cycles: result.metrics.clone(),
            latency_ns: result.metrics.as_ref().map(|l| l.to_ns(result.clock_mhz)),
            sequence: result.sequence.clone(),
            counters: result.counters.clone(),
            flags: result.flags.clone(),
            integrity_findings: m.integrity_findings.clone(),
            reproduction: Reproduction {
                scenario: result.scenario.name.clone(),
                seed: result.seed,
                plusargs: result.program.clone(),
                trace_sha256: result.trace_sha256.clone(),
            },
        }
    }

    pub fn passed(&self) -> bool {
        self.result == "PASS"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sentinel_fault::config::HarnessConfig;
    use sentinel_fault::scenario::FaultScenario;
    use sentinel_fault::simulator::SimulationOutput;
    use sentinel_fault::ScenarioCatalog;
    use sentinel_trace::decode::encode;
    use sentinel_trace::record::{Opcode, TraceFlags, TraceRecord};

    /// A result for `name` built from a clean trace with `drop_every`
    /// ids missing (0 = none) and the given counter text.
    pub(crate) fn sample_result(name: &str, drop_every: u64, stdout: &str) -> FaultResult {
        let catalog = ScenarioCatalog::builtin();
        let scenario: &FaultScenario = catalog.get(name).unwrap();
        let records: Vec<_> = (0..400u64)
            .filter(|i| drop_every == 0 || i % drop_every != 1)
            .map(|i| {
                let t = i * 4;
                let latency = if scenario.under_fault(t) { 33 } else { 11 };
                TraceRecord::new(i, t, t + latency, TraceFlags::NONE, Opcode::TxEvent, i as u32)
                    .unwrap()
            })
            .collect();
        let output = SimulationOutput {
            trace: encode(None, &records),
            stdout: stdout.to_string(),
        };
        FaultResult::from_run(scenario, 7, &output, &HarnessConfig::default())
    }

    #[test]
    fn passing_report() {
        let result = sample_result("backpressure_storm", 0, "Trace drops: 0\n");
        let report = IncidentReport::from_result(&result);
        assert!(report.passed(), "{:?}", report.errors);
        assert_eq!(report.severity, Severity::Info);
        assert_eq!(report.metrics.latency_spike, "3.0x");
        assert_eq!(report.metrics.transactions, 400);
        assert_eq!(report.faults, vec!["backpressure(@1000..2000)"]);
        assert_eq!(report.reproduction.seed, 7);
        assert!(report.reproduction.plusargs.contains(&"+fault0_type=1".to_string()));
    }

    #[test]
    fn failing_report_takes_worst_severity() {
        // reset_mid_stream allows no drops; reported drops disagree too.
        let result = sample_result("reset_mid_stream", 10, "Trace drops: 0\n");
        let report = IncidentReport::from_result(&result);
        assert!(!report.passed());
        assert_eq!(report.severity, Severity::Critical);
        assert!(report.errors.iter().any(|e| e.starts_with("Too many drops")));
        assert!(!report.integrity_findings.is_empty());
    }

    #[test]
    fn severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
        assert_eq!(Severity::of(&Violation::ReorderNotDetected), Severity::Medium);
        assert_eq!(Severity::High.to_string(), "high");
    }
}
