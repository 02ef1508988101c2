//! Narrative explanations for `ai_explanation.md`.
//!
//! Only the deterministic template is implemented here. A model-backed
//! explainer can be plugged in through [`Explainer`], but pack content is
//! only reproducible with a deterministic one.

use crate::render::thousands;
use sentinel_fault::result::FaultResult;
use std::fmt;

pub trait Explainer: Send + Sync {
    /// Markdown narrative for one result.
    fn explain(&self, result: &FaultResult) -> String;
}

/// Fixed-template explanation; a pure function of the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

impl Explainer for TemplateExplainer {
    fn explain(&self, result: &FaultResult) -> String {
        Narrative(result).to_string()
    }
}

struct Narrative<'a>(&'a FaultResult);

impl fmt::Display for Narrative<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        let scenario = &result.scenario;
        let m = &result.measurements;
        let passed = result.passed();

        writeln!(f, "# AI Analysis: {}\n", scenario.name)?;
        writeln!(f, "## Summary\n")?;
        if passed {
            writeln!(
                f,
                "The system successfully handled the **{}** fault scenario.\n",
                scenario.name
            )?;
        } else {
            writeln!(
                f,
                "The system encountered issues during the **{}** fault scenario.\n",
                scenario.name
            )?;
        }
        writeln!(f, "{}\n", scenario.description)?;

        writeln!(f, "## Behavior During Fault\n")?;
        writeln!(
            f,
            "- **Transactions completed:** {}",
            thousands(m.transactions_completed)
        )?;
        writeln!(f, "- **Traces dropped:** {}", m.drop_count)?;
        writeln!(f, "- **Latency impact:** {:.1}x baseline", m.max_latency_spike)?;
        writeln!(
            f,
            "- **Kill switch:** {}",
            if m.kill_switch_triggered { "Triggered" } else { "Not triggered" }
        )?;
        if m.reorder_detected {
            writeln!(
                f,
                "- **Reordering:** detected (max distance {}), not counted as loss",
                result.sequence.max_reorder_distance
            )?;
        }
        if result.sequence.resets > 0 {
            writeln!(
                f,
                "- **Resets:** {} ({} false drops)",
                result.sequence.resets, m.false_drops
            )?;
        }
        writeln!(f)?;

        writeln!(f, "## Analysis\n")?;
        if passed {
            writeln!(f, "The system recovered gracefully after the fault condition ended.\n")?;
        } else {
            writeln!(
                f,
                "The following issues were detected: {}\n",
                result.errors().join("; ")
            )?;
        }

        writeln!(f, "## Recommendations\n")?;
        if passed {
            writeln!(f, "1. Continue monitoring system behavior under similar conditions")?;
        } else {
            writeln!(f, "1. Investigate the root cause of failures")?;
        }
        writeln!(f, "2. Consider expanding test coverage for edge cases")?;
        writeln!(f, "3. Review recovery timing after fault conditions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_result;

    #[test]
    fn passing_narrative() {
        let result = sample_result("backpressure_storm", 0, "");
        let text = TemplateExplainer.explain(&result);
        assert!(text.starts_with("# AI Analysis: backpressure_storm\n"));
        assert!(text.contains("successfully handled the **backpressure_storm**"));
        assert!(text.contains("- **Latency impact:** 3.0x baseline"));
        assert!(text.contains("recovered gracefully"));
    }

    #[test]
    fn failing_narrative_lists_errors() {
        let result = sample_result("kill_switch_trigger", 0, "");
        let text = TemplateExplainer.explain(&result);
        assert!(text.contains("encountered issues"));
        assert!(text.contains("Kill switch should have triggered but didn't"));
        assert!(text.contains("1. Investigate the root cause of failures"));
    }

    #[test]
    fn deterministic() {
        let result = sample_result("fifo_overflow", 4, "Trace drops: 100\n");
        assert_eq!(
            TemplateExplainer.explain(&result),
            TemplateExplainer.explain(&result)
        );
    }
}
