//! Parser for the simulator's textual counter report.
//!
//! The simulator prints `Key: value` lines on stdout after a run. The
//! counters are the source of truth for backpressure and overflow figures;
//! they are surfaced unchanged and never re-derived from records.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CYCLES_RUN: &str = "Cycles run";
pub const TRANSACTIONS_SENT: &str = "Transactions sent";
pub const TRANSACTIONS_RECEIVED: &str = "Transactions received";
pub const TRACE_DROPS: &str = "Trace drops";
pub const IN_BACKPRESSURE: &str = "In backpressure cycles";
pub const OUT_BACKPRESSURE: &str = "Out backpressure cycles";
pub const INFLIGHT_UNDERFLOWS: &str = "Inflight underflows";
pub const TRACE_OVERFLOW_SEEN: &str = "Trace overflow seen";
pub const KILL_SWITCH_TRIGGERED: &str = "Kill switch triggered";

/// Counters reported by one simulator run. `None` means the key was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCounters {
    pub cycles_run: Option<u64>,
    pub transactions_sent: Option<u64>,
    pub transactions_received: Option<u64>,
    pub trace_drops: Option<u64>,
    pub in_backpressure_cycles: Option<u64>,
    pub out_backpressure_cycles: Option<u64>,
    pub inflight_underflows: Option<u64>,
    pub trace_overflow_seen: Option<bool>,
    pub kill_switch_triggered: Option<bool>,
    /// Lines whose key was recognized but whose value was not.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SimCounters {
    /// Parse counter lines out of free-form simulator output.
    ///
    /// Unknown lines are ignored. Keys are matched exactly after trimming,
    /// so `Trace drops (expected): 4` does not set `trace_drops`.
    pub fn parse(text: &str) -> Self {
        let mut counters = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let slot = match key {
                CYCLES_RUN => &mut counters.cycles_run,
                TRANSACTIONS_SENT => &mut counters.transactions_sent,
                TRANSACTIONS_RECEIVED => &mut counters.transactions_received,
                TRACE_DROPS => &mut counters.trace_drops,
                IN_BACKPRESSURE => &mut counters.in_backpressure_cycles,
                OUT_BACKPRESSURE => &mut counters.out_backpressure_cycles,
                INFLIGHT_UNDERFLOWS => &mut counters.inflight_underflows,
                TRACE_OVERFLOW_SEEN => {
                    Self::store_bool(&mut counters.trace_overflow_seen, &mut counters.warnings, lineno, key, value);
                    continue;
                }
                KILL_SWITCH_TRIGGERED => {
                    Self::store_bool(&mut counters.kill_switch_triggered, &mut counters.warnings, lineno, key, value);
                    continue;
                }
                _ => continue,
            };
            match value.parse::<u64>() {
                Ok(v) => *slot = Some(v),
                Err(_) => {
                    let msg = format!("line {}: {key}: unparseable value {value:?}", lineno + 1);
                    warn!("simulator counters: {msg}");
                    counters.warnings.push(msg);
                }
            }
        }
        counters
    }

    fn store_bool(
        slot: &mut Option<bool>,
        warnings: &mut Vec<String>,
        lineno: usize,
        key: &str,
        value: &str,
    ) {
        match value {
            "1" | "true" | "yes" => *slot = Some(true),
            "0" | "false" | "no" => *slot = Some(false),
            _ => {
                let msg = format!("line {}: {key}: expected 0/1, got {value:?}", lineno + 1);
                warn!("simulator counters: {msg}");
                warnings.push(msg);
            }
        }
    }

    /// Render the present counters in the simulator's own format.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SimCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric = [
            (CYCLES_RUN, self.cycles_run),
            (TRANSACTIONS_SENT, self.transactions_sent),
            (TRANSACTIONS_RECEIVED, self.transactions_received),
            (TRACE_DROPS, self.trace_drops),
            (IN_BACKPRESSURE, self.in_backpressure_cycles),
            (OUT_BACKPRESSURE, self.out_backpressure_cycles),
            (INFLIGHT_UNDERFLOWS, self.inflight_underflows),
        ];
        for (key, value) in numeric {
            if let Some(v) = value {
                writeln!(f, "{key}: {v}")?;
            }
        }
        for (key, value) in [
            (TRACE_OVERFLOW_SEEN, self.trace_overflow_seen),
            (KILL_SWITCH_TRIGGERED, self.kill_switch_triggered),
        ] {
            if let Some(v) = value {
                writeln!(f, "{key}: {}", u8::from(v))?;
            }
        }
        Ok(())
    }
}
