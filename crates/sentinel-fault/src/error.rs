use crate::simulator::SimulationFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single scenario run or catalog operation.
#[derive(Error, Debug)]
pub enum FaultError {
    #[error("Unknown scenario: {name}. Available: {}", .available.join(", "))]
    UnknownScenario {
        name: String,
        available: Vec<String>,
    },

    #[error("duplicate scenario name {0:?}")]
    DuplicateScenario(String),

    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationFailure),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("worker for scenario {0:?} panicked")]
    WorkerPanicked(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FaultError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FaultError::Io {
            path: path.into(),
            source,
        }
    }
}
