//! Named, versioned fault scenarios.

use crate::contract::ExpectedBehavior;
use crate::faults::{ActiveWindow, FaultConfig, FaultType};
use crate::program::{FaultProgram, FaultProgramBuilder};
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1".to_string()
}

fn default_stimulus() -> u64 {
    10_000
}

/// A complete fault injection test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultScenario {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub faults: Vec<FaultConfig>,
    #[serde(default)]
    pub expected: ExpectedBehavior,
    #[serde(default = "default_stimulus")]
    pub stimulus_transactions: u64,
}

impl FaultScenario {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: description.into(),
            faults: Vec::new(),
            expected: ExpectedBehavior::default(),
            stimulus_transactions: default_stimulus(),
        }
    }

    pub fn fault(mut self, fault: FaultConfig) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn expect(mut self, expected: ExpectedBehavior) -> Self {
        self.expected = expected;
        self
    }

    /// Look-ahead window for sequence reconciliation: the largest
    /// `Reorder` distance injected by this scenario, or 0.
    pub fn reorder_window(&self) -> u64 {
        self.faults
            .iter()
            .filter(|f| f.fault_type == FaultType::Reorder)
            .map(|f| f.parameter)
            .max()
            .unwrap_or(0)
    }

    /// Active windows of every fault except `None`.
    pub fn fault_windows(&self) -> Vec<ActiveWindow> {
        self.faults
            .iter()
            .filter(|f| f.fault_type != FaultType::None)
            .map(FaultConfig::active_window)
            .collect()
    }

    /// Whether `cycle` falls inside any fault's active window.
    pub fn under_fault(&self, cycle: u64) -> bool {
        self.fault_windows().iter().any(|w| w.contains(cycle))
    }

    /// The wire program for one run of this scenario.
    pub fn program(&self, seed: u64) -> FaultProgram {
        FaultProgramBuilder::new()
            .faults(self.faults.iter().copied())
            .transactions(self.stimulus_transactions)
            .seed(seed)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_window_is_max_reorder_parameter() {
        let s = FaultScenario::new("x", "")
            .fault(FaultConfig::new(FaultType::Reorder, 10).lasting(5).with_parameter(3))
            .fault(FaultConfig::new(FaultType::Burst, 20).lasting(5).with_parameter(100))
            .fault(FaultConfig::new(FaultType::Reorder, 30).lasting(5).with_parameter(7));
        assert_eq!(s.reorder_window(), 7);
        assert_eq!(FaultScenario::new("y", "").reorder_window(), 0);
    }

    #[test]
    fn under_fault_covers_all_windows() {
        let s = FaultScenario::new("x", "")
            .fault(FaultConfig::new(FaultType::Backpressure, 100).lasting(50))
            .fault(FaultConfig::new(FaultType::KillSwitch, 1000));
        assert!(!s.under_fault(99));
        assert!(s.under_fault(120));
        assert!(!s.under_fault(150));
        assert!(s.under_fault(5000));
    }

    #[test]
    fn program_carries_stimulus_and_seed() {
        let s = FaultScenario::new("x", "").fault(FaultConfig::new(FaultType::Reset, 1500));
        let p = s.program(7);
        assert_eq!(p.num_tx(), 10_000);
        assert_eq!(p.seed(), 7);
        assert_eq!(p.faults(), &s.faults[..]);
    }

    #[test]
    fn json_defaults() {
        let s: FaultScenario = serde_json::from_str(
            r#"{"name": "custom", "faults": [{"type": "BACKPRESSURE", "trigger_cycle": 10, "duration_cycles": 5}]}"#,
        )
        .unwrap();
        assert_eq!(s.version, "1");
        assert_eq!(s.stimulus_transactions, 10_000);
        assert_eq!(s.expected, ExpectedBehavior::default());
    }
}
