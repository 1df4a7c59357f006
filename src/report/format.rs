//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{BootstrapConfig, FitResult, Histogram, ParamVector, RunSummary};
use crate::report::DatasetChi2;

/// Widest histogram bar, in characters.
const BAR_WIDTH: usize = 40;

/// Format the reference fit: parameters, χ², and per-dataset contributions.
pub fn format_fit(fit: &FitResult, parts: &[DatasetChi2]) -> String {
    let mut out = String::new();

    out.push_str("=== tmd - joint fit ===\n");
    out.push_str(&format!(
        "Points: n={} | evaluations={}\n",
        fit.n_points, fit.evaluations
    ));
    match fit.reduced_chi2() {
        Some(r) => out.push_str(&format!("chi2: {:.4} (chi2/dof = {r:.4})\n", fit.chi2)),
        None => out.push_str(&format!("chi2: {:.4}\n", fit.chi2)),
    }

    out.push_str("\nParameters:\n");
    for (name, value) in ParamVector::NAMES.iter().zip(fit.params.0) {
        out.push_str(&format!("  {name:<3} = {value:>12.6}\n"));
    }

    if !parts.is_empty() {
        out.push_str("\nPer dataset:\n");
        for part in parts {
            out.push_str(&format!(
                "  {:<4} {:<18} n={:<4} chi2={:.4}\n",
                part.process.label(),
                part.process.reaction(),
                part.n_points,
                part.chi2
            ));
        }
    }

    out
}

/// Format the bootstrap summary with one text histogram per parameter.
pub fn format_summary(summary: &RunSummary, config: &BootstrapConfig) -> String {
    let mut out = String::new();

    out.push_str("=== tmd - bootstrap ===\n");
    out.push_str(&format!(
        "Trials: requested={} succeeded={} retried={} dropped={}\n",
        summary.requested, summary.succeeded, summary.retried, summary.dropped
    ));
    out.push_str(&format!(
        "Seed: {} | noise={:?} | failure policy={:?} | bins={}\n",
        config.seed, config.noise, config.failure_policy, config.bins
    ));

    if summary.parameters.is_empty() {
        out.push_str("\nNo successful trials.\n");
        return out;
    }

    out.push_str(&format!(
        "\n{:<4} {:>12} {:>12} {:>12} {:>12}\n",
        "", "mean", "std_dev", "min", "max"
    ));
    for p in &summary.parameters {
        out.push_str(&format!(
            "{:<4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
            p.name, p.mean, p.std_dev, p.min, p.max
        ));
    }

    for p in &summary.parameters {
        out.push_str(&format!("\n{} (mean {:.4}, std_dev {:.4}):\n", p.name, p.mean, p.std_dev));
        out.push_str(&format_histogram(&p.histogram));
    }

    out
}

/// Horizontal bar chart, one line per bin.
pub fn format_histogram(h: &Histogram) -> String {
    let max = h.counts.iter().copied().max().unwrap_or(0);
    let mut out = String::new();
    for (i, &count) in h.counts.iter().enumerate() {
        let len = if max == 0 { 0 } else { count * BAR_WIDTH / max };
        let line = format!(
            "  [{:>10.4}, {:>10.4}{} {:>5} {}",
            h.edges[i],
            h.edges[i + 1],
            if i + 1 == h.counts.len() { "]" } else { ")" },
            count,
            "#".repeat(len)
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
