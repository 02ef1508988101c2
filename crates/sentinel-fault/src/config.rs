//! Harness configuration.
//!
//! Loaded from JSON (missing fields take defaults), then optionally
//! overridden from the environment:
//!
//! | Variable                | Field           |
//! |-------------------------|-----------------|
//! | `SENTINEL_SIMULATOR`    | `simulator`     |
//! | `SENTINEL_TIMEOUT_SECS` | `timeout_secs`  |
//! | `SENTINEL_CLOCK_MHZ`    | `clock_mhz`     |
//! | `SENTINEL_WORK_ROOT`    | `work_root`     |

use crate::error::FaultError;
use crate::program::DEFAULT_SEED;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SIMULATOR: &str = "SENTINEL_SIMULATOR";
pub const ENV_TIMEOUT_SECS: &str = "SENTINEL_TIMEOUT_SECS";
pub const ENV_CLOCK_MHZ: &str = "SENTINEL_CLOCK_MHZ";
pub const ENV_WORK_ROOT: &str = "SENTINEL_WORK_ROOT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Simulator executable.
    pub simulator: PathBuf,
    /// Arguments placed before the fault program.
    pub simulator_args: Vec<String>,
    pub timeout_secs: u64,
    /// Parent of the per-run working directories.
    pub work_root: PathBuf,
    /// Shell clock rate used for cycle to ns conversion.
    pub clock_mhz: f64,
    pub seed: u64,
    /// Allowed difference between reported and derived drop counts.
    pub drop_tolerance: u64,
    /// Keep working directories after successful runs.
    pub keep_work_dirs: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            simulator: PathBuf::from("sim/obj_dir/Vtb_sentinel_shell"),
            simulator_args: Vec::new(),
            timeout_secs: 300,
            work_root: std::env::temp_dir().join("sentinel-runs"),
            clock_mhz: 100.0,
            seed: DEFAULT_SEED,
            drop_tolerance: 0,
            keep_work_dirs: false,
        }
    }
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self, FaultError> {
        let text = std::fs::read_to_string(path).map_err(|e| FaultError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| FaultError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), FaultError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), FaultError> {
        if let Some(sim) = lookup(ENV_SIMULATOR) {
            self.simulator = PathBuf::from(sim);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| FaultError::Config(format!("{ENV_TIMEOUT_SECS}={secs:?} is not an integer")))?;
        }
        if let Some(mhz) = lookup(ENV_CLOCK_MHZ) {
            self.clock_mhz = mhz
                .trim()
                .parse()
                .map_err(|_| FaultError::Config(format!("{ENV_CLOCK_MHZ}={mhz:?} is not a number")))?;
        }
        if let Some(root) = lookup(ENV_WORK_ROOT) {
            self.work_root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FaultError> {
        if !(self.clock_mhz.is_finite() && self.clock_mhz > 0.0) {
            return Err(FaultError::Config(format!(
                "clock_mhz must be positive, got {}",
                self.clock_mhz
            )));
        }
        if self.timeout_secs == 0 {
            return Err(FaultError::Config("timeout_secs must be non-zero".into()));
        }
        if self.simulator.as_os_str().is_empty() {
            return Err(FaultError::Config("simulator path is empty".into()));
        }
        Ok(())
    }
}
