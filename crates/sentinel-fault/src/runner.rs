//! Scenario runner: the orchestrator.
//!
//! The [`ScenarioRunner`] ties the read-only [`ScenarioCatalog`], a
//! [`Simulator`] and the [`HarnessConfig`] together. One run is strictly
//! sequential:
//!
//! ```text
//!  catalog.get(name) ─▶ program(seed) ─▶ simulator.run ─▶ FaultResult::from_run
//!                                            │                   │
//!                          isolated work dir ┘                   └▶ verdict
//! ```
//!
//! Batches run one scoped thread per scenario. Each run owns its working
//! directory; the catalog is the only shared state and is never mutated.
//! On any failure the working directory is removed and no result escapes.
//!
//! # Example
//!
//! ```no_run
//! use sentinel_fault::catalog::ScenarioCatalog;
//! use sentinel_fault::config::HarnessConfig;
//! use sentinel_fault::runner::ScenarioRunner;
//! use sentinel_fault::simulator::ProcessSimulator;
//!
//! let catalog = ScenarioCatalog::builtin();
//! let config = HarnessConfig::default();
//! let simulator = ProcessSimulator::from_config(&config);
//! let runner = ScenarioRunner::new(&catalog, &simulator, config).unwrap();
//!
//! let result = runner.run("backpressure_storm").unwrap();
//! println!("{result}");
//! ```

use crate::catalog::ScenarioCatalog;
use crate::config::HarnessConfig;
use crate::error::FaultError;
use crate::result::FaultResult;
use crate::scenario::FaultScenario;
use crate::simulator::{CancelToken, SimulationOutput, SimulationRequest, Simulator};
use log::{info, warn};
use sentinel_trace::verifier::{DeterminismVerifier, VerificationResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of one scenario in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub scenario: String,
    pub outcome: Result<FaultResult, FaultError>,
}

impl BatchOutcome {
    pub fn passed(&self) -> bool {
        self.outcome.as_ref().is_ok_and(FaultResult::passed)
    }
}

/// Same-seed and different-seed trace comparison for one scenario.
#[derive(Debug, Clone)]
pub struct DeterminismReport {
    pub scenario: String,
    pub seed_a: u64,
    pub seed_b: u64,
    /// Two runs with `seed_a`.
    pub same_seed: VerificationResult,
    /// `seed_a` against `seed_b`.
    pub different_seed: VerificationResult,
}

impl DeterminismReport {
    pub fn same_seed_matches(&self) -> bool {
        self.same_seed.is_deterministic
    }

    pub fn different_seeds_differ(&self) -> bool {
        !self.different_seed.is_deterministic
    }

    /// Record index where the same-seed traces first differ.
    pub fn first_divergence(&self) -> Option<usize> {
        self.same_seed
            .first_divergence
            .as_ref()
            .map(|d| d.record_index)
    }

    pub fn holds(&self) -> bool {
        self.same_seed_matches() && self.different_seeds_differ()
    }
}

impl fmt::Display for DeterminismReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Determinism check for {}", self.scenario)?;
        writeln!(
            f,
            "  seed {:#x} x2: {} vs {} ({})",
            self.seed_a,
            self.same_seed.digest_a,
            self.same_seed.digest_b,
            if self.same_seed_matches() { "match" } else { "MISMATCH" }
        )?;
        write!(
            f,
            "  seed {:#x} vs {:#x}: {}",
            self.seed_a,
            self.seed_b,
            if self.different_seeds_differ() { "differ" } else { "IDENTICAL" }
        )?;
        if let Some(index) = self.first_divergence() {
            write!(f, "\n  first divergence at record {index}")?;
        }
        Ok(())
    }
}

/// Per-run working directory, removed on drop unless kept.
struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    fn create(root: &Path, scenario: &str, seed: u64) -> Result<Self, FaultError> {
        std::fs::create_dir_all(root).map_err(|e| FaultError::io(root, e))?;
        loop {
            let n = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = root.join(format!(
                "{scenario}-{seed:x}-{}-{n}",
                std::process::id()
            ));
            match std::fs::create_dir(&path) {
                Ok(()) => return Ok(Self { path, keep: false }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(FaultError::io(path, e)),
            }
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("could not remove {}: {e}", self.path.display());
        }
    }
}

/// Runs catalog scenarios against a simulator.
pub struct ScenarioRunner<'a> {
    catalog: &'a ScenarioCatalog,
    simulator: &'a dyn Simulator,
    config: HarnessConfig,
    cancel: CancelToken,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(
        catalog: &'a ScenarioCatalog,
        simulator: &'a dyn Simulator,
        config: HarnessConfig,
    ) -> Result<Self, FaultError> {
        config.validate()?;
        Ok(Self {
            catalog,
            simulator,
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Token that abandons every in-flight and future run of this runner.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run a scenario with the configured seed.
    pub fn run(&self, name: &str) -> Result<FaultResult, FaultError> {
        self.run_with_seed(name, self.config.seed)
    }

    pub fn run_with_seed(&self, name: &str, seed: u64) -> Result<FaultResult, FaultError> {
        let scenario = self.catalog.get(name)?;
        info!(
            "[{}] starting: {} faults, {} transactions, seed {seed:#x}",
            scenario.name,
            scenario.faults.len(),
            scenario.stimulus_transactions
        );

        let mut work_dir = WorkDir::create(&self.config.work_root, &scenario.name, seed)?;
        let output = self.simulate(scenario, seed, &work_dir.path)?;
        let result = FaultResult::from_run(scenario, seed, &output, &self.config);

        if self.config.keep_work_dirs {
            work_dir.keep = true;
            info!("[{}] work dir kept at {}", scenario.name, work_dir.path.display());
        }
        info!("[{}] finished: {result}", scenario.name);
        Ok(result)
    }

    /// Run every named scenario on its own thread. One failure never
    /// affects the others.
    pub fn run_batch(&self, names: &[&str]) -> Vec<BatchOutcome> {
        let outcomes: Vec<BatchOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = names
                .iter()
                .map(|&name| (name, s.spawn(move || self.run(name))))
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| BatchOutcome {
                    scenario: name.to_string(),
                    outcome: handle
                        .join()
                        .unwrap_or_else(|_| Err(FaultError::WorkerPanicked(name.to_string()))),
                })
                .collect()
        });

        let passed = outcomes.iter().filter(|o| o.passed()).count();
        info!("batch finished: {passed}/{} passed", outcomes.len());
        outcomes
    }

    /// Run the whole catalog.
    pub fn run_all(&self) -> Vec<BatchOutcome> {
        let names = self.catalog.names();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.run_batch(&refs)
    }

    /// Run `name` twice with `seed_a` and once with `seed_b` and compare traces.
    pub fn verify_determinism(
        &self,
        name: &str,
        seed_a: u64,
        seed_b: u64,
    ) -> Result<DeterminismReport, FaultError> {
        let scenario = self.catalog.get(name)?;
        let mut traces = Vec::with_capacity(3);
        for seed in [seed_a, seed_a, seed_b] {
            let work_dir = WorkDir::create(&self.config.work_root, &scenario.name, seed)?;
            traces.push(self.simulate(scenario, seed, &work_dir.path)?.trace);
        }

        let report = DeterminismReport {
            scenario: scenario.name.clone(),
            seed_a,
            seed_b,
            same_seed: DeterminismVerifier::compare(&traces[0], &traces[1]),
            different_seed: DeterminismVerifier::compare(&traces[0], &traces[2]),
        };
        if report.holds() {
            info!("[{}] determinism holds", scenario.name);
        } else {
            warn!("{report}");
        }
        Ok(report)
    }

    fn simulate(
        &self,
        scenario: &FaultScenario,
        seed: u64,
        work_dir: &Path,
    ) -> Result<SimulationOutput, FaultError> {
        let request = SimulationRequest {
            scenario: scenario.name.clone(),
            program: scenario
                .program(seed)
                .with_trace_file(work_dir.join("trace.bin")),
            work_dir: work_dir.to_path_buf(),
            timeout: self.config.timeout(),
        };
        self.simulator.run(&request, &self.cancel).map_err(|e| {
            warn!("[{}] simulation failed: {e}", scenario.name);
            FaultError::from(e)
        })
    }
}
