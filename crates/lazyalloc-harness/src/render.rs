//! Report rendering for completed runs.

use std::fmt::Write as _;

use lazyalloc_core::BenchmarkRun;
use lazyalloc_core::report::fmt_percent;

/// What the binary prints to stdout after the console trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable trace and summary only.
    #[default]
    Text,
    /// Trace and summary, followed by the run as pretty JSON.
    Json,
}

pub fn render_json(run: &BenchmarkRun) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(run)
}

/// Markdown report: configuration, per-trial phase table, derived metrics.
#[must_use]
pub fn render_markdown(run: &BenchmarkRun) -> String {
    let cfg = &run.config;
    let r = &run.report;
    let g = &cfg.grouping;

    let mut out = String::new();
    writeln!(out, "# Lazy Allocation Report").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "- Buffer: {} MiB ({} bytes)",
        cfg.size_mib(),
        g.format_u64(cfg.buffer_size_bytes as u64)
    )
    .ok();
    writeln!(out, "- Trial order: {}", cfg.trial_order.as_str()).ok();
    writeln!(
        out,
        "- Sanity write: {}",
        if cfg.sanity_write { "on" } else { "off" }
    )
    .ok();
    writeln!(out, "- Bypass heuristic: {}", cfg.bypass_heuristic.as_str()).ok();
    writeln!(out).ok();

    writeln!(out, "## Phases (us)").ok();
    writeln!(out).ok();
    writeln!(out, "| # | Strategy | init | first write | second write | third write |").ok();
    writeln!(out, "|--:|----------|-----:|------------:|-------------:|------------:|").ok();
    for (idx, t) in run.trials.iter().enumerate() {
        let third = t
            .third_write
            .map_or_else(|| String::from("-"), |w| g.format_micros(w));
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {third} |",
            idx + 1,
            t.strategy.allocator_call(),
            g.format_micros(t.init),
            g.format_micros(t.first_write),
            g.format_micros(t.second_write),
        )
        .ok();
    }
    writeln!(out).ok();

    writeln!(out, "## Comparison").ok();
    writeln!(out).ok();
    writeln!(out, "| Metric | Value |").ok();
    writeln!(out, "|--------|------:|").ok();
    writeln!(
        out,
        "| first write slowdown from lazy allocation | {} |",
        fmt_percent(r.slowed_down_percent)
    )
    .ok();
    writeln!(
        out,
        "| first write gain without lazy allocation | {} |",
        fmt_percent(r.speed_gain_percent)
    )
    .ok();
    writeln!(
        out,
        "| first write gain from page touch | {} |",
        fmt_percent(r.speed_gain_by_touch_percent)
    )
    .ok();
    writeln!(
        out,
        "| zeroing first/second write difference | {:.2}% |",
        r.zeroing_write_difference_percent
    )
    .ok();
    if let Some(drift) = r.max_sanity_drift_percent {
        writeln!(out, "| max second/third write drift | {drift:.2}% |").ok();
    }
    writeln!(
        out,
        "| total time saved by touch (unreliable) | {} us ({}) |",
        g.format_micros(r.total_saved_us),
        fmt_percent(r.total_saved_percent)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "## Verdict").ok();
    writeln!(out).ok();
    writeln!(out, "{}", r.verdict().sentence()).ok();
    writeln!(out).ok();
    writeln!(
        out,
        "- write-symmetry: {}",
        r.write_symmetry_verdict.sentence()
    )
    .ok();
    writeln!(
        out,
        "- init-compare: {}",
        r.init_compare_verdict.sentence()
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "## Notes").ok();
    writeln!(
        out,
        "- Single sample per phase; compare ratios and the verdict, not absolute microseconds."
    )
    .ok();
    writeln!(
        out,
        "- Total time includes allocator reuse of memory freed by earlier trials in this process."
    )
    .ok();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyalloc_core::{
        AllocationStrategy, BenchmarkConfig, BenchmarkTimes, BypassHeuristic, ComparisonReport,
    };

    fn fixture_run(sanity: bool) -> BenchmarkRun {
        let config = BenchmarkConfig::from_mib(64).unwrap().with_sanity_write(sanity);
        let mut trials = vec![
            BenchmarkTimes::new(AllocationStrategy::Plain, 12.0, 48_000.0, 12_000.0),
            BenchmarkTimes::new(AllocationStrategy::Zeroing, 20.0, 47_000.0, 12_100.0),
            BenchmarkTimes::new(AllocationStrategy::Touched, 36_000.0, 12_050.0, 12_000.0),
        ];
        if sanity {
            trials = trials
                .into_iter()
                .map(|t| {
                    let second = t.second_write;
                    t.with_third_write(second)
                })
                .collect();
        }
        let report = ComparisonReport::from_trials(
            &trials,
            config.size_mib(),
            config.trial_order,
            BypassHeuristic::WriteSymmetry,
        )
        .unwrap();
        BenchmarkRun {
            config,
            trials,
            report,
        }
    }

    #[test]
    fn markdown_has_phase_rows_and_metrics() {
        let md = render_markdown(&fixture_run(true));
        assert!(md.starts_with("# Lazy Allocation Report"));
        assert!(md.contains("- Buffer: 64 MiB (67,108,864 bytes)"));
        assert!(md.contains("| 1 | malloc | 12 | 48,000 | 12,000 | 12,000 |"));
        assert!(md.contains("| 3 | malloc + page touch | 36,000 | 12,050 | 12,000 | 12,000 |"));
        assert!(md.contains("| first write slowdown from lazy allocation | 300.00% |"));
        assert!(md.contains("| first write gain without lazy allocation | 75.00% |"));
        assert!(md.contains("| max second/third write drift | 0.00% |"));
        assert!(md.contains("Zeroing allocation used lazy allocation, like [malloc]"));
    }

    #[test]
    fn markdown_verdicts_use_sentences_not_debug_names() {
        let md = render_markdown(&fixture_run(true));
        assert!(md.contains(
            "- write-symmetry: Zeroing allocation used lazy allocation, like [malloc]"
        ));
        assert!(md.contains(
            "- init-compare: Zeroing allocation bypassed lazy allocation, like [malloc + touch]"
        ));
        assert!(!md.contains("UsedLazyAllocation"));
        assert!(!md.contains(": Bypassed"));
    }

    #[test]
    fn markdown_marks_missing_third_write() {
        let md = render_markdown(&fixture_run(false));
        assert!(md.contains("| 2 | calloc | 20 | 47,000 | 12,100 | - |"));
        assert!(!md.contains("max second/third write drift"));
        assert!(md.contains("- Sanity write: off"));
    }

    #[test]
    fn json_round_trips_report_fields() {
        let json = render_json(&fixture_run(true)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["report"]["write_symmetry_verdict"], "used_lazy_allocation");
        assert_eq!(parsed["report"]["init_compare_verdict"], "bypassed");
        assert_eq!(parsed["trials"][2]["strategy"], "touched");
        assert_eq!(parsed["trials"][2]["third_write"], 12_000.0);
    }
}
