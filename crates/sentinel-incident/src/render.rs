//! Text renderings of an incident: JSON, markdown and the pack README.
//!
//! Every function here is pure. Output depends only on its input, which
//! is what makes pack contents reproducible.

use crate::report::IncidentReport;
use sentinel_fault::result::FaultResult;
use std::fmt;

/// `1234567` → `"1,234,567"`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Pretty JSON with a trailing newline.
pub fn render_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Human-readable mirror of `report.json`.
pub fn render_markdown(report: &IncidentReport) -> String {
    MarkdownReport(report).to_string()
}

/// Reproduction instructions for the pack.
pub fn render_readme(result: &FaultResult) -> String {
    Readme(result).to_string()
}

/// `report.md` layout.
pub struct MarkdownReport<'a>(pub &'a IncidentReport);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let m = &report.metrics;

        writeln!(f, "# Fault Injection Report: {}\n", report.scenario)?;
        writeln!(f, "**Status:** {}\n", report.result)?;
        writeln!(f, "**Severity:** {}\n", report.severity)?;

        writeln!(f, "## Description\n")?;
        writeln!(f, "{}\n", report.description)?;

        writeln!(f, "## Faults\n")?;
        for fault in &report.faults {
            writeln!(f, "- `{fault}`")?;
        }
        writeln!(f)?;

        writeln!(f, "## Results\n")?;
        writeln!(f, "| Metric | Value |")?;
        writeln!(f, "|--------|-------|")?;
        writeln!(f, "| Transactions | {} |", thousands(m.transactions))?;
        writeln!(f, "| Drops | {} |", m.drops)?;
        writeln!(f, "| False drops | {} |", m.false_drops)?;
        writeln!(
            f,
            "| Kill Switch | {} |",
            if m.kill_switch { "Triggered" } else { "Clear" }
        )?;
        writeln!(f, "| Latency Spike | {} |", m.latency_spike)?;
        writeln!(f, "| P99 (baseline) | {:.0}ns |", m.p99_baseline_ns)?;
        writeln!(f, "| P99 (fault) | {:.0}ns |", m.p99_fault_ns)?;
        writeln!(f, "| Reorder detected | {} |", yes_no(m.reorder_detected))?;
        writeln!(f, "| Reset handled | {} |", yes_no(m.reset_handled))?;
        writeln!(f, "| Metrics intact | {} |", yes_no(m.metrics_uncorrupted))?;
        writeln!(f)?;

        if let Some(ref l) = report.latency_cycles {
            writeln!(f, "## Latency (cycles)\n")?;
            writeln!(f, "| min | p50 | p90 | p99 | p99.9 | max | mean |")?;
            writeln!(f, "|-----|-----|-----|-----|-------|-----|------|")?;
            writeln!(
                f,
                "| {} | {} | {} | {} | {} | {} | {:.2} |\n",
                l.min_cycles, l.p50_cycles, l.p90_cycles, l.p99_cycles, l.p999_cycles, l.max_cycles, l.mean_cycles
            )?;
        }

        writeln!(f, "## Sequence\n")?;
        writeln!(f, "{}\n", report.sequence)?;

        writeln!(f, "## Errors\n")?;
        if report.errors.is_empty() {
            writeln!(f, "None")?;
        }
        for e in &report.errors {
            writeln!(f, "- {e}")?;
        }
        Ok(())
    }
}

/// Pack `README.md` layout.
pub struct Readme<'a>(pub &'a FaultResult);

impl fmt::Display for Readme<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        let scenario = &result.scenario;

        writeln!(f, "# Incident Pack: {}\n", scenario.name)?;
        writeln!(
            f,
            "This incident pack contains traces and analysis from a fault injection test.\n"
        )?;

        writeln!(f, "## Contents\n")?;
        writeln!(f, "- `report.json` - Structured analysis results")?;
        writeln!(f, "- `report.md` - Human-readable report")?;
        writeln!(f, "- `ai_explanation.md` - Generated analysis")?;
        writeln!(f, "- `manifest.json` - Pack provenance and checksums\n")?;

        writeln!(f, "## Scenario\n")?;
        writeln!(f, "**{}** (version {})\n", scenario.name, scenario.version)?;
        writeln!(f, "{}\n", scenario.description)?;

        writeln!(f, "## Result\n")?;
        writeln!(f, "{}\n", if result.passed() { "PASS" } else { "FAIL" })?;

        writeln!(f, "## Reproduction\n")?;
        writeln!(
            f,
            "Run the simulator with these plusargs (add `+trace_file=<path>`):\n"
        )?;
        writeln!(f, "```text")?;
        for arg in &result.program {
            writeln!(f, "{arg}")?;
        }
        writeln!(f, "```\n")?;
        writeln!(
            f,
            "A deterministic simulator reproduces a trace with SHA-256 `{}`.",
            result.trace_sha256
        )
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
