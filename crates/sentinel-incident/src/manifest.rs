//! `manifest.json`: provenance and per-file digests.

use chrono::{DateTime, SecondsFormat, Utc};
use sentinel_fault::result::FaultResult;
use sentinel_fault::scenario::FaultScenario;
use sentinel_trace::record::RECORD_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: &str = "1.0";
pub const TOOL_NAME: &str = "sentinel-hft";
pub const TRACE_FORMAT: &str = "v1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub clock_mhz: f64,
    pub trace_format: String,
    pub record_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub passed: bool,
    pub errors: Vec<String>,
}

/// Digest and size of one pack file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    /// The only time-dependent field in a pack.
    pub generated_at: String,
    pub tool: ToolInfo,
    pub hardware: HardwareInfo,
    pub scenario: FaultScenario,
    pub result: ResultSummary,
    pub trace_sha256: String,
    /// Keyed by file name, relative to the pack directory.
    pub files: BTreeMap<String, FileEntry>,
}

impl Manifest {
    pub fn new(
        result: &FaultResult,
        generated_at: DateTime<Utc>,
        files: BTreeMap<String, FileEntry>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            tool: ToolInfo::default(),
            hardware: HardwareInfo {
                clock_mhz: result.clock_mhz,
                trace_format: TRACE_FORMAT.to_string(),
                record_size: RECORD_SIZE,
            },
            scenario: result.scenario.clone(),
            result: ResultSummary {
                passed: result.passed(),
                errors: result.errors(),
            },
            trace_sha256: result.trace_sha256.clone(),
            files,
        }
    }
}
