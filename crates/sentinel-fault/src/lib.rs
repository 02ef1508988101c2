//! Fault scenarios, behavioral contracts and simulator orchestration for
//! the Sentinel latency shell.
//!
//! This crate provides four main components:
//!
//! 1. **[`faults`] / [`program`]**: Fault types and the plusarg wire
//!    program handed to the simulator
//! 2. **[`scenario`] / [`catalog`]**: Named scenarios with their
//!    [`contract::ExpectedBehavior`], collected in a read-only catalog
//! 3. **[`runner`]**: Runs scenarios against a [`simulator::Simulator`],
//!    alone or as an isolated parallel batch
//! 4. **[`result`]**: Derives a validated [`result::FaultResult`] from raw
//!    simulator output
//!
//! # Architecture
//!
//! ```text
//! ScenarioCatalog         ScenarioRunner               sentinel-trace
//! ───────────────         ──────────────               ──────────────
//! get(name)       ──→ program(seed).args()
//!                     Simulator::run()      ──→ trace bytes + counters
//!                     FaultResult::from_run ──→ decode / track / metrics
//!                     ExpectedBehavior::validate ──→ Verdict
//! ```

pub mod catalog;
pub mod config;
pub mod contract;
pub mod error;
pub mod faults;
pub mod program;
pub mod result;
pub mod runner;
pub mod scenario;
pub mod simulator;

#[cfg(test)]
mod synthetic;

pub use catalog::ScenarioCatalog;
pub use config::HarnessConfig;
pub use contract::{ExpectedBehavior, Measurements, Verdict, Violation};
pub use error::FaultError;
pub use faults::{FaultConfig, FaultType};
pub use result::FaultResult;
pub use runner::{BatchOutcome, ScenarioRunner};
pub use scenario::FaultScenario;
pub use simulator::{ProcessSimulator, SimulationFailure, Simulator};
