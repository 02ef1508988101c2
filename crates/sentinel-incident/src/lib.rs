//! Incident packs for Sentinel fault-injection runs.
//!
//! A [`FaultResult`](sentinel_fault::FaultResult) is turned into a
//! self-contained directory that a reviewer can read, verify and use to
//! reproduce the run. Apart from the manifest timestamp, every byte of a
//! pack is a pure function of the result, so two packs generated from the
//! same result carry identical file digests.
//!
//! # Pipeline
//!
//! ```text
//! FaultResult
//!     │
//!     ├──→ IncidentReport::from_result ──→ report.json, report.md
//!     ├──→ Explainer::explain          ──→ ai_explanation.md
//!     ├──→ render_readme               ──→ README.md
//!     │
//!     └──→ Manifest::new(files, now)   ──→ manifest.json (written last)
//! ```
//!
//! # Modules
//!
//! | Module       | Contents                                          |
//! |--------------|---------------------------------------------------|
//! | [`report`]   | [`IncidentReport`], [`Severity`] classification  |
//! | [`render`]   | JSON / markdown / README renderers                |
//! | [`explain`]  | [`Explainer`] trait and the template explainer    |
//! | [`manifest`] | Provenance and per-file SHA-256 digests           |
//! | [`pack`]     | [`IncidentPack`] generation, opening, verification |
//!
//! # Example
//!
//! ```no_run
//! use sentinel_fault::{ProcessSimulator, HarnessConfig, ScenarioCatalog, ScenarioRunner};
//! use sentinel_incident::IncidentPack;
//! use std::path::Path;
//!
//! let config = HarnessConfig::default();
//! let catalog = ScenarioCatalog::builtin();
//! let simulator = ProcessSimulator::from_config(&config);
//! let runner = ScenarioRunner::new(&catalog, &simulator, config).unwrap();
//!
//! let result = runner.run("fifo_overflow").unwrap();
//! let pack = IncidentPack::generate(&result, Path::new("incidents")).unwrap();
//! assert!(pack.verify().unwrap().is_empty());
//! ```

pub mod explain;
pub mod manifest;
pub mod pack;
pub mod render;
pub mod report;

pub use explain::{Explainer, TemplateExplainer};
pub use manifest::Manifest;
pub use pack::{DigestMismatch, IncidentPack, PackError};
pub use report::{IncidentReport, Severity};
