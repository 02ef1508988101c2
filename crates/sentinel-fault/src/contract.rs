//! Behavioral contracts: what a scenario's run must look like.
//!
//! An [`ExpectedBehavior`] is a bundle of predicates over the measured
//! outcome of one run. [`ExpectedBehavior::validate`] is pure: it reads the
//! measurements and returns a [`Verdict`] listing every violated predicate.
//! A failed verdict is not an error; the run still produces a complete
//! result that can be packed for diagnosis.
//!
//! # Predicates
//!
//! | Predicate                     | Violated when                                   |
//! |-------------------------------|-------------------------------------------------|
//! | `min_drops` / `max_drops`     | drop count outside `[min, max]`                 |
//! | `should_trigger_kill_switch`  | kill-switch state differs from expectation      |
//! | `max_latency_spike_factor`    | fault p99 / baseline p99 exceeds the factor     |
//! | `reorder_detected`            | required but no reordering was observed         |
//! | `reset_handled`               | required but no clean reset was observed        |
//! | `metrics_uncorrupted`         | required but an integrity finding was raised    |
//! | `max_false_drops`             | more drops were later recovered than allowed    |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Measured values a contract is evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub transactions_completed: u64,
    pub drop_count: u64,
    pub false_drops: u64,
    pub kill_switch_triggered: bool,
    /// Fault-window p99 over baseline p99.
    pub max_latency_spike: f64,
    pub baseline_p99_ns: f64,
    pub fault_p99_ns: f64,
    pub reorder_detected: bool,
    pub reset_handled: bool,
    pub metrics_uncorrupted: bool,
    /// Why `metrics_uncorrupted` is false, if it is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrity_findings: Vec<String>,
}

impl Default for Measurements {
    fn default() -> Self {
        Self {
            transactions_completed: 0,
            drop_count: 0,
            false_drops: 0,
            kill_switch_triggered: false,
            max_latency_spike: 1.0,
            baseline_p99_ns: 0.0,
            fault_p99_ns: 0.0,
            reorder_detected: false,
            reset_handled: false,
            metrics_uncorrupted: true,
            integrity_findings: Vec::new(),
        }
    }
}

/// Expected system behavior during and after fault injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedBehavior {
    pub min_drops: u64,
    pub max_drops: u64,
    pub should_trigger_kill_switch: bool,
    pub max_latency_spike_factor: f64,
    pub reorder_detected: bool,
    pub reset_handled: bool,
    pub metrics_uncorrupted: bool,
    pub max_false_drops: u64,
}

impl Default for ExpectedBehavior {
    fn default() -> Self {
        Self {
            min_drops: 0,
            max_drops: 0,
            should_trigger_kill_switch: false,
            max_latency_spike_factor: 10.0,
            reorder_detected: false,
            reset_handled: false,
            metrics_uncorrupted: true,
            max_false_drops: 0,
        }
    }
}

/// One violated predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    TooFewDrops { drops: u64, min: u64 },
    TooManyDrops { drops: u64, max: u64 },
    KillSwitchNotTriggered,
    KillSwitchUnexpected,
    LatencySpike { spike: f64, max: f64 },
    ReorderNotDetected,
    ResetNotHandled { false_drops: u64 },
    MetricsCorrupted { findings: Vec<String> },
    TooManyFalseDrops { false_drops: u64, max: u64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TooFewDrops { drops, min } => write!(f, "Too few drops: {drops} < {min}"),
            Violation::TooManyDrops { drops, max } => write!(f, "Too many drops: {drops} > {max}"),
            Violation::KillSwitchNotTriggered => {
                write!(f, "Kill switch should have triggered but didn't")
            }
            Violation::KillSwitchUnexpected => write!(f, "Kill switch triggered unexpectedly"),
            Violation::LatencySpike { spike, max } => {
                write!(f, "Latency spike too high: {spike:.1}x > {max:.1}x")
            }
            Violation::ReorderNotDetected => {
                write!(f, "Reordering was injected but not detected")
            }
            Violation::ResetNotHandled { false_drops } => write!(
                f,
                "Reset not handled cleanly ({false_drops} drops attributed across the reset)"
            ),
            Violation::MetricsCorrupted { findings } => {
                write!(f, "Metrics corrupted: {}", findings.join("; "))
            }
            Violation::TooManyFalseDrops { false_drops, max } => {
                write!(f, "Too many false drops: {false_drops} > {max}")
            }
        }
    }
}

/// Pass/fail plus every violated predicate, in predicate order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl Verdict {
    /// Human-readable error list.
    pub fn errors(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            return write!(f, "PASS");
        }
        write!(f, "FAIL ({} violations)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

impl ExpectedBehavior {
    /// Evaluate every predicate against `m`.
    pub fn validate(&self, m: &Measurements) -> Verdict {
        let mut violations = Vec::new();

        if m.drop_count < self.min_drops {
            violations.push(Violation::TooFewDrops {
                drops: m.drop_count,
                min: self.min_drops,
            });
        }
        if m.drop_count > self.max_drops {
            violations.push(Violation::TooManyDrops {
                drops: m.drop_count,
                max: self.max_drops,
            });
        }

        match (self.should_trigger_kill_switch, m.kill_switch_triggered) {
            (true, false) => violations.push(Violation::KillSwitchNotTriggered),
            (false, true) => violations.push(Violation::KillSwitchUnexpected),
            _ => {}
        }

        if m.max_latency_spike > self.max_latency_spike_factor {
            violations.push(Violation::LatencySpike {
                spike: m.max_latency_spike,
                max: self.max_latency_spike_factor,
            });
        }

        if self.reorder_detected && !m.reorder_detected {
            violations.push(Violation::ReorderNotDetected);
        }
        if self.reset_handled && !m.reset_handled {
            violations.push(Violation::ResetNotHandled {
                false_drops: m.false_drops,
            });
        }
        if self.metrics_uncorrupted && !m.metrics_uncorrupted {
            violations.push(Violation::MetricsCorrupted {
                findings: m.integrity_findings.clone(),
            });
        }
        if m.false_drops > self.max_false_drops {
            violations.push(Violation::TooManyFalseDrops {
                false_drops: m.false_drops,
                max: self.max_false_drops,
            });
        }

        Verdict {
            passed: violations.is_empty(),
            violations,
        }
    }
}
