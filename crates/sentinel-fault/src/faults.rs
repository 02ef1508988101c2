//! Fault type definitions for the shell's RTL fault injector.
//!
//! Each variant corresponds to a `FAULT_*` identifier recognized by the
//! simulator. Discriminants are part of the wire contract and must never
//! be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fault the RTL injector knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum FaultType {
    None = 0,
    /// Downstream holds ready low.
    Backpressure = 1,
    /// Trace FIFO forced full.
    FifoOverflow = 2,
    /// Latch the kill switch as if a risk limit had been breached.
    KillSwitch = 3,
    /// Flip bits in the data path.
    CorruptData = 4,
    /// Stretch the core clock.
    ClockStretch = 5,
    /// Inject `parameter` extra transactions.
    Burst = 6,
    /// Emit tx_ids up to `parameter` positions out of order.
    Reorder = 7,
    /// Emit a reset record and restart tx_ids at 0.
    Reset = 8,
}

impl FaultType {
    pub const ALL: [FaultType; 9] = [
        FaultType::None,
        FaultType::Backpressure,
        FaultType::FifoOverflow,
        FaultType::KillSwitch,
        FaultType::CorruptData,
        FaultType::ClockStretch,
        FaultType::Burst,
        FaultType::Reorder,
        FaultType::Reset,
    ];

    /// Identifier passed in `+fault{i}_type=`.
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    pub fn from_wire_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| u64::from(t.wire_id()) == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            FaultType::None => "NONE",
            FaultType::Backpressure => "BACKPRESSURE",
            FaultType::FifoOverflow => "FIFO_OVERFLOW",
            FaultType::KillSwitch => "KILL_SWITCH",
            FaultType::CorruptData => "CORRUPT_DATA",
            FaultType::ClockStretch => "CLOCK_STRETCH",
            FaultType::Burst => "BURST",
            FaultType::Reorder => "REORDER",
            FaultType::Reset => "RESET",
        }
    }

    /// What `parameter` means for this fault, if anything.
    pub fn parameter_meaning(self) -> Option<&'static str> {
        match self {
            FaultType::Burst => Some("extra transactions"),
            FaultType::Reorder => Some("max reorder distance"),
            FaultType::ClockStretch => Some("stretch factor"),
            FaultType::CorruptData => Some("corruption mask"),
            FaultType::None
            | FaultType::Backpressure
            | FaultType::FifoOverflow
            | FaultType::KillSwitch
            | FaultType::Reset => None,
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cycle interval during which a fault is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: u64,
    /// Exclusive end; `None` for latching faults.
    pub end: Option<u64>,
}

impl ActiveWindow {
    pub fn contains(&self, cycle: u64) -> bool {
        cycle >= self.start && self.end.map_or(true, |end| cycle < end)
    }
}

/// One fault instance in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    #[serde(rename = "type")]
    pub fault_type: FaultType,
    pub trigger_cycle: u64,
    /// 0 means single-shot / latching.
    #[serde(default)]
    pub duration_cycles: u64,
    #[serde(default)]
    pub parameter: u64,
}

impl FaultConfig {
    pub fn new(fault_type: FaultType, trigger_cycle: u64) -> Self {
        Self {
            fault_type,
            trigger_cycle,
            duration_cycles: 0,
            parameter: 0,
        }
    }

    pub fn lasting(mut self, duration_cycles: u64) -> Self {
        self.duration_cycles = duration_cycles;
        self
    }

    pub fn with_parameter(mut self, parameter: u64) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn is_latching(&self) -> bool {
        self.duration_cycles == 0
    }

    pub fn active_window(&self) -> ActiveWindow {
        ActiveWindow {
            start: self.trigger_cycle,
            end: (!self.is_latching()).then(|| self.trigger_cycle.saturating_add(self.duration_cycles)),
        }
    }

    /// The four plusargs for fault slot `index`.
    pub fn to_wire(&self, index: usize) -> [String; 4] {
        [
            format!("+fault{index}_type={}", self.fault_type.wire_id()),
            format!("+fault{index}_trigger={}", self.trigger_cycle),
            format!("+fault{index}_duration={}", self.duration_cycles),
            format!("+fault{index}_param={}", self.parameter),
        ]
    }
}

impl fmt::Display for FaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.fault_type.name().to_lowercase().replace('_', "-");
        if self.is_latching() {
            write!(f, "{name}(@{}, latching", self.trigger_cycle)?;
        } else {
            write!(
                f,
                "{name}(@{}..{}",
                self.trigger_cycle,
                self.trigger_cycle.saturating_add(self.duration_cycles)
            )?;
        }
        if let Some(meaning) = self.fault_type.parameter_meaning() {
            write!(f, ", {meaning}={}", self.parameter)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ids_are_stable() {
        let expected = [
            (FaultType::None, 0),
            (FaultType::Backpressure, 1),
            (FaultType::FifoOverflow, 2),
            (FaultType::KillSwitch, 3),
            (FaultType::CorruptData, 4),
            (FaultType::ClockStretch, 5),
            (FaultType::Burst, 6),
            (FaultType::Reorder, 7),
            (FaultType::Reset, 8),
        ];
        for (ty, id) in expected {
            assert_eq!(ty.wire_id(), id);
            assert_eq!(FaultType::from_wire_id(u64::from(id)), Some(ty));
        }
        assert_eq!(FaultType::from_wire_id(9), None);
    }

    #[test]
    fn to_wire_format() {
        let cfg = FaultConfig::new(FaultType::Reorder, 800).lasting(100).with_parameter(5);
        assert_eq!(
            cfg.to_wire(2),
            [
                "+fault2_type=7".to_string(),
                "+fault2_trigger=800".to_string(),
                "+fault2_duration=100".to_string(),
                "+fault2_param=5".to_string(),
            ]
        );
    }

    #[test]
    fn active_window_bounded() {
        let w = FaultConfig::new(FaultType::Backpressure, 1000).lasting(1000).active_window();
        assert!(!w.contains(999));
        assert!(w.contains(1000));
        assert!(w.contains(1999));
        assert!(!w.contains(2000));
    }

    #[test]
    fn latching_window_is_open_ended() {
        let w = FaultConfig::new(FaultType::KillSwitch, 2000).active_window();
        assert_eq!(w.end, None);
        assert!(w.contains(u64::MAX));
        assert!(!w.contains(1999));
    }

    #[test]
    fn serde_uses_wire_names() {
        let cfg = FaultConfig::new(FaultType::FifoOverflow, 500).lasting(200);
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"FIFO_OVERFLOW","trigger_cycle":500,"duration_cycles":200,"parameter":0}"#
        );
        let back: FaultConfig = serde_json::from_str(r#"{"type":"RESET","trigger_cycle":1500}"#).unwrap();
        assert_eq!(back, FaultConfig::new(FaultType::Reset, 1500));
    }

    #[test]
    fn display() {
        let cfg = FaultConfig::new(FaultType::Burst, 1200).lasting(300).with_parameter(100);
        assert_eq!(cfg.to_string(), "burst(@1200..1500, extra transactions=100)");
        assert_eq!(
            FaultConfig::new(FaultType::Reset, 1500).to_string(),
            "reset(@1500, latching)"
        );
    }
}
