//! Incident pack generation and verification.
//!
//! A pack is one directory per run:
//!
//! ```text
//! {scenario}_{YYYYMMDD_HHMMSS}/
//! ├── report.json        structured verdict + metrics
//! ├── report.md          human-readable mirror
//! ├── ai_explanation.md  template narrative
//! ├── README.md          reproduction instructions
//! └── manifest.json      provenance + sha256 of the four files above
//! ```
//!
//! Files are written in that order, manifest last. Everything except the
//! manifest's `generated_at` is a pure function of the [`FaultResult`].
//! A failed write leaves the partial directory in place.

use crate::explain::{Explainer, TemplateExplainer};
use crate::manifest::{FileEntry, Manifest};
use crate::render::{render_json, render_markdown, render_readme};
use crate::report::IncidentReport;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sentinel_fault::result::FaultResult;
use sentinel_trace::verifier::sha256_hex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MD: &str = "report.md";
pub const EXPLANATION_MD: &str = "ai_explanation.md";
pub const README_MD: &str = "README.md";
pub const MANIFEST_JSON: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A file whose content no longer matches the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub file: String,
    pub expected: FileEntry,
    /// `None` when the file is missing.
    pub actual: Option<FileEntry>,
}

impl fmt::Display for DigestMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actual {
            Some(ref actual) => write!(
                f,
                "{}: expected sha256 {} ({} bytes), found {} ({} bytes)",
                self.file, self.expected.sha256, self.expected.bytes, actual.sha256, actual.bytes
            ),
            None => write!(f, "{}: missing", self.file),
        }
    }
}

/// Directory name for a pack generated at `at`.
pub fn pack_dir_name(scenario: &str, at: DateTime<Utc>) -> String {
    let safe: String = scenario
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}_{}", at.format("%Y%m%d_%H%M%S"))
}

fn entry(content: &[u8]) -> FileEntry {
    FileEntry {
        sha256: sha256_hex(content),
        bytes: content.len() as u64,
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<FileEntry, PackError> {
    std::fs::write(path, content).map_err(|source| PackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("wrote {} ({} bytes)", path.display(), content.len());
    Ok(entry(content))
}

/// A generated (or opened) pack on disk.
#[derive(Debug, Clone)]
pub struct IncidentPack {
    dir: PathBuf,
    manifest: Manifest,
}

impl IncidentPack {
    /// Generate a pack under `output_dir` with the template explainer.
    pub fn generate(result: &FaultResult, output_dir: &Path) -> Result<Self, PackError> {
        Self::generate_with(result, output_dir, &TemplateExplainer, Utc::now())
    }

    /// Generate a pack with an explicit explainer and timestamp.
    pub fn generate_with(
        result: &FaultResult,
        output_dir: &Path,
        explainer: &dyn Explainer,
        at: DateTime<Utc>,
    ) -> Result<Self, PackError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| PackError::Io { path, source }
        };

        std::fs::create_dir_all(output_dir).map_err(io(output_dir))?;
        let dir = output_dir.join(pack_dir_name(&result.scenario.name, at));
        std::fs::create_dir(&dir).map_err(io(&dir))?;

        let report = IncidentReport::from_result(result);
        let report_json = render_json(&report).map_err(|source| PackError::Json {
            path: dir.join(REPORT_JSON),
            source,
        })?;

        let contents = [
            (REPORT_JSON, report_json),
            (REPORT_MD, render_markdown(&report)),
            (EXPLANATION_MD, explainer.explain(result)),
            (README_MD, render_readme(result)),
        ];
        let mut files = BTreeMap::new();
        for (name, content) in contents {
            let entry = write_file(&dir.join(name), content.as_bytes()).inspect_err(|e| {
                warn!("incident pack left incomplete at {}: {e}", dir.display());
            })?;
            files.insert(name.to_string(), entry);
        }

        let manifest = Manifest::new(result, at, files);
        let manifest_path = dir.join(MANIFEST_JSON);
        let manifest_json = render_json(&manifest).map_err(|source| PackError::Json {
            path: manifest_path.clone(),
            source,
        })?;
        write_file(&manifest_path, manifest_json.as_bytes())?;

        info!(
            "[{}] incident pack written to {} ({})",
            result.scenario.name,
            dir.display(),
            if result.passed() { "PASS" } else { "FAIL" }
        );
        Ok(Self { dir, manifest })
    }

    /// Load an existing pack's manifest.
    pub fn open(dir: &Path) -> Result<Self, PackError> {
        let path = dir.join(MANIFEST_JSON);
        let text = std::fs::read_to_string(&path).map_err(|source| PackError::Io {
            path: path.clone(),
            source,
        })?;
        let manifest =
            serde_json::from_str(&text).map_err(|source| PackError::Json { path, source })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Re-hash every file listed in the manifest. Empty means intact.
    pub fn verify(&self) -> Result<Vec<DigestMismatch>, PackError> {
        let mut mismatches = Vec::new();
        for (name, expected) in &self.manifest.files {
            let path = self.dir.join(name);
            let actual = match std::fs::read(&path) {
                Ok(bytes) => Some(entry(&bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(source) => return Err(PackError::Io { path, source }),
            };
            if actual.as_ref() != Some(expected) {
                mismatches.push(DigestMismatch {
                    file: name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        for m in &mismatches {
            warn!("{}: {m}", self.dir.display());
        }
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_result;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, sec).unwrap()
    }

    #[test]
    fn writes_five_files_with_matching_digests() {
        let out = TempDir::new().unwrap();
        let result = sample_result("backpressure_storm", 0, "Trace drops: 0\n");
        let pack =
            IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(5)).unwrap();

        assert_eq!(
            pack.dir().file_name().unwrap().to_str().unwrap(),
            "backpressure_storm_20260102_030405"
        );
        for name in [REPORT_JSON, REPORT_MD, EXPLANATION_MD, README_MD, MANIFEST_JSON] {
            assert!(pack.dir().join(name).is_file(), "{name} missing");
        }
        let files = &pack.manifest().files;
        assert_eq!(files.len(), 4);
        for (name, e) in files {
            let bytes = std::fs::read(pack.dir().join(name)).unwrap();
            assert_eq!(e.sha256, sha256_hex(&bytes));
            assert_eq!(e.bytes, bytes.len() as u64);
        }
        assert!(pack.verify().unwrap().is_empty());
    }

    #[test]
    fn generation_is_idempotent_apart_from_timestamp() {
        let out = TempDir::new().unwrap();
        let result = sample_result("reorder_burst", 0, "");
        let a = IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(1)).unwrap();
        let b = IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(2)).unwrap();

        assert_ne!(a.dir(), b.dir());
        assert_eq!(a.manifest().files, b.manifest().files);
        for name in [REPORT_JSON, REPORT_MD, EXPLANATION_MD, README_MD] {
            assert_eq!(
                std::fs::read(a.dir().join(name)).unwrap(),
                std::fs::read(b.dir().join(name)).unwrap()
            );
        }
        let mut ma = a.manifest().clone();
        let mb = b.manifest().clone();
        assert_ne!(ma.generated_at, mb.generated_at);
        ma.generated_at = mb.generated_at.clone();
        assert_eq!(ma, mb);
    }

    #[test]
    fn existing_directory_is_an_io_error() {
        let out = TempDir::new().unwrap();
        let result = sample_result("fifo_overflow", 0, "");
        IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(9)).unwrap();
        let err =
            IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(9)).unwrap_err();
        assert!(matches!(err, PackError::Io { .. }));
    }

    #[test]
    fn partial_pack_is_left_in_place() {
        // Occupies the README path with a directory once the pack dir exists.
        struct BlockReadme(PathBuf);
        impl Explainer for BlockReadme {
            fn explain(&self, result: &FaultResult) -> String {
                std::fs::create_dir(self.0.join(README_MD)).unwrap();
                TemplateExplainer.explain(result)
            }
        }

        let out = TempDir::new().unwrap();
        let result = sample_result("fifo_overflow", 0, "");
        let pack_dir = out.path().join(pack_dir_name("fifo_overflow", at(3)));
        let err = IncidentPack::generate_with(
            &result,
            out.path(),
            &BlockReadme(pack_dir.clone()),
            at(3),
        )
        .unwrap_err();

        assert!(matches!(err, PackError::Io { ref path, .. } if path.ends_with(README_MD)));
        assert!(pack_dir.join(REPORT_JSON).is_file());
        assert!(pack_dir.join(EXPLANATION_MD).is_file());
        assert!(!pack_dir.join(MANIFEST_JSON).exists());
    }

    #[test]
    fn scenario_names_are_path_safe() {
        assert_eq!(pack_dir_name("a/b c", at(0)), "a_b_c_20260102_030400");
    }

    #[test]
    fn verify_detects_tampering_and_missing_files() {
        let out = TempDir::new().unwrap();
        let result = sample_result("kill_switch_trigger", 0, "");
        let pack =
            IncidentPack::generate_with(&result, out.path(), &TemplateExplainer, at(7)).unwrap();

        std::fs::write(pack.dir().join(REPORT_MD), "edited by hand\n").unwrap();
        std::fs::remove_file(pack.dir().join(EXPLANATION_MD)).unwrap();

        let reopened = IncidentPack::open(pack.dir()).unwrap();
        let mismatches = reopened.verify().unwrap();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].file, EXPLANATION_MD);
        assert!(mismatches[0].actual.is_none());
        assert_eq!(mismatches[1].file, REPORT_MD);
        assert_eq!(mismatches[1].actual.as_ref().unwrap().bytes, 15);
        assert!(mismatches[1].to_string().starts_with("report.md: expected sha256"));
    }

    #[test]
    fn manifest_reflects_verdict() {
        let out = TempDir::new().unwrap();
        let result = sample_result("kill_switch_trigger", 0, "");
        let pack = IncidentPack::generate(&result, out.path()).unwrap();
        let reopened = IncidentPack::open(pack.dir()).unwrap();
        assert!(!reopened.manifest().result.passed);
        assert!(reopened
            .manifest()
            .result
            .errors
            .contains(&"Kill switch should have triggered but didn't".to_string()));
        assert_eq!(reopened.manifest().trace_sha256, result.trace_sha256);
    }
}
