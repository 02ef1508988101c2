//! The scenario catalog.
//!
//! A [`ScenarioCatalog`] is an immutable table from scenario name to
//! [`FaultScenario`]. It is built once (usually [`ScenarioCatalog::builtin`])
//! and passed by reference to every runner; nothing mutates it after
//! construction, so one catalog can be shared across batch threads.
//!
//! # Built-in scenarios
//!
//! | Name                  | Faults                                 | Contract                        |
//! |-----------------------|----------------------------------------|---------------------------------|
//! | `backpressure_storm`  | backpressure @1000 for 1000            | drops 0..=100, spike <= 5x      |
//! | `fifo_overflow`       | FIFO full @500 for 200                 | drops 10..=100                  |
//! | `kill_switch_trigger` | kill switch @2000, latching            | kill switch must trigger        |
//! | `cascading_failure`   | backpressure @1000+500, burst @1200    | drops 20..=200, spike <= 10x    |
//! | `reorder_burst`       | reorder @800 for 100, distance 5       | reorder detected, 0 false drops |
//! | `reset_mid_stream`    | reset @1500                            | reset handled, 0 false drops    |

use crate::contract::ExpectedBehavior;
use crate::error::FaultError;
use crate::faults::{FaultConfig, FaultType};
use crate::scenario::FaultScenario;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, FaultScenario>,
}

impl ScenarioCatalog {
    /// Build a catalog, rejecting duplicate names.
    pub fn from_scenarios(
        scenarios: impl IntoIterator<Item = FaultScenario>,
    ) -> Result<Self, FaultError> {
        let mut map = BTreeMap::new();
        for scenario in scenarios {
            if map.contains_key(&scenario.name) {
                return Err(FaultError::DuplicateScenario(scenario.name));
            }
            map.insert(scenario.name.clone(), scenario);
        }
        Ok(Self { scenarios: map })
    }

    /// Load a JSON array of scenarios from `path`.
    pub fn load_json(path: &Path) -> Result<Self, FaultError> {
        let text = std::fs::read_to_string(path).map_err(|e| FaultError::io(path, e))?;
        let scenarios: Vec<FaultScenario> =
            serde_json::from_str(&text).map_err(|source| FaultError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_scenarios(scenarios)?;
        log::debug!(
            "loaded {} scenarios from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// The six scenarios every build ships with.
    pub fn builtin() -> Self {
        let scenarios = [
            FaultScenario::new(
                "backpressure_storm",
                "Downstream system holds ready low for 1000 cycles, simulating a slow \
                 consumer. The system should buffer traces and drop gracefully if FIFO fills.",
            )
            .fault(FaultConfig::new(FaultType::Backpressure, 1000).lasting(1000))
            .expect(ExpectedBehavior {
                min_drops: 0,
                max_drops: 100,
                should_trigger_kill_switch: false,
                max_latency_spike_factor: 5.0,
                ..ExpectedBehavior::default()
            }),
            FaultScenario::new(
                "fifo_overflow",
                "Force the trace FIFO full for 200 cycles. Verifies graceful degradation \
                 where traces are dropped but pipeline continues.",
            )
            .fault(FaultConfig::new(FaultType::FifoOverflow, 500).lasting(200))
            .expect(ExpectedBehavior {
                min_drops: 10,
                max_drops: 100,
                ..ExpectedBehavior::default()
            }),
            FaultScenario::new(
                "kill_switch_trigger",
                "Trigger the kill switch as if loss threshold was exceeded. All trading \
                 should halt immediately.",
            )
            .fault(FaultConfig::new(FaultType::KillSwitch, 2000))
            .expect(ExpectedBehavior {
                should_trigger_kill_switch: true,
                ..ExpectedBehavior::default()
            }),
            FaultScenario::new(
                "cascading_failure",
                "Backpressure combined with traffic burst, simulating a realistic overload \
                 scenario. Tests compound failure handling.",
            )
            .fault(FaultConfig::new(FaultType::Backpressure, 1000).lasting(500))
            .fault(
                FaultConfig::new(FaultType::Burst, 1200)
                    .lasting(300)
                    .with_parameter(100),
            )
            .expect(ExpectedBehavior {
                min_drops: 20,
                max_drops: 200,
                max_latency_spike_factor: 10.0,
                ..ExpectedBehavior::default()
            }),
            FaultScenario::new(
                "reorder_burst",
                "Inject sequence numbers out of order, simulating network reordering. \
                 The sequence tracker should detect reordering but NOT count it as drops.",
            )
            .fault(
                FaultConfig::new(FaultType::Reorder, 800)
                    .lasting(100)
                    .with_parameter(5),
            )
            .expect(ExpectedBehavior {
                reorder_detected: true,
                metrics_uncorrupted: true,
                max_false_drops: 0,
                ..ExpectedBehavior::default()
            }),
            FaultScenario::new(
                "reset_mid_stream",
                "Emit a RESET record and restart sequence numbers at 0. Simulates FPGA \
                 reconfiguration or firmware update. Must NOT report billions of drops.",
            )
            .fault(FaultConfig::new(FaultType::Reset, 1500))
            .expect(ExpectedBehavior {
                reset_handled: true,
                max_false_drops: 0,
                ..ExpectedBehavior::default()
            }),
        ];
        Self {
            scenarios: scenarios.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Look up a scenario by name.
    pub fn get(&self, name: &str) -> Result<&FaultScenario, FaultError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| FaultError::UnknownScenario {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Scenario names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.scenarios.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaultScenario> {
        self.scenarios.values()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_has_six_sorted_scenarios() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(
            catalog.names(),
            vec![
                "backpressure_storm",
                "cascading_failure",
                "fifo_overflow",
                "kill_switch_trigger",
                "reorder_burst",
                "reset_mid_stream",
            ]
        );
    }

    #[test]
    fn builtin_definitions() {
        let catalog = ScenarioCatalog::builtin();

        let storm = catalog.get("backpressure_storm").unwrap();
        assert_eq!(
            storm.faults,
            vec![FaultConfig::new(FaultType::Backpressure, 1000).lasting(1000)]
        );
        assert_eq!(storm.expected.max_drops, 100);
        assert_eq!(storm.expected.max_latency_spike_factor, 5.0);

        let kill = catalog.get("kill_switch_trigger").unwrap();
        assert!(kill.faults[0].is_latching());
        assert!(kill.expected.should_trigger_kill_switch);

        let reorder = catalog.get("reorder_burst").unwrap();
        assert_eq!(reorder.reorder_window(), 5);
        assert!(reorder.expected.reorder_detected);

        let reset = catalog.get("reset_mid_stream").unwrap();
        assert!(reset.expected.reset_handled);
        assert_eq!(reset.reorder_window(), 0);

        for scenario in catalog.iter() {
            assert_eq!(scenario.stimulus_transactions, 10_000);
            assert_eq!(scenario.version, "1");
        }
    }

    #[test]
    fn unknown_scenario_lists_names() {
        let err = ScenarioCatalog::builtin().get("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Unknown scenario: nope. Available: backpressure_storm"));
        assert!(msg.contains("reset_mid_stream"));
    }

    #[test]
    fn duplicates_rejected() {
        let a = FaultScenario::new("dup", "a");
        let b = FaultScenario::new("dup", "b");
        assert!(matches!(
            ScenarioCatalog::from_scenarios([a, b]),
            Err(FaultError::DuplicateScenario(name)) if name == "dup"
        ));
    }

    #[test]
    fn load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "slow", "faults": [{{"type": "CLOCK_STRETCH", "trigger_cycle": 100, "duration_cycles": 50, "parameter": 2}}], "expected": {{"max_drops": 5}}}}]"#
        )
        .unwrap();
        let catalog = ScenarioCatalog::load_json(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        let slow = catalog.get("slow").unwrap();
        assert_eq!(slow.faults[0].fault_type, FaultType::ClockStretch);
        assert_eq!(slow.expected.max_drops, 5);
    }

    #[test]
    fn load_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ScenarioCatalog::load_json(file.path()).unwrap_err();
        assert!(matches!(err, FaultError::Json { .. }));
    }

    #[test]
    fn scenario_json_round_trips_through_catalog() {
        let catalog = ScenarioCatalog::builtin();
        let all: Vec<&FaultScenario> = catalog.iter().collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &all).unwrap();
        let back = ScenarioCatalog::load_json(file.path()).unwrap();
        assert_eq!(back.names(), catalog.names());
        assert_eq!(
            back.get("cascading_failure").unwrap(),
            catalog.get("cascading_failure").unwrap()
        );
    }
}
