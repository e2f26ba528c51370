//! Comparison report derived from the three trial samples.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::{BypassHeuristic, TrialOrder};
use crate::error::BenchError;
use crate::format::NumberGrouping;
use crate::strategy::AllocationStrategy;
use crate::timing::{BenchmarkTimes, relative_difference};

/// Relative first/second write difference below which zeroing counts as having
/// paid its page faults up front.
pub const BYPASS_THRESHOLD: f64 = 0.05;

/// Whether the zeroing allocator avoided deferring page faults to the first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassVerdict {
    /// Behaves like the touched strategy.
    Bypassed,
    /// Behaves like the plain strategy.
    UsedLazyAllocation,
}

impl BypassVerdict {
    #[must_use]
    pub const fn from_bypassed(bypassed: bool) -> Self {
        if bypassed {
            Self::Bypassed
        } else {
            Self::UsedLazyAllocation
        }
    }

    #[must_use]
    pub const fn is_bypassed(self) -> bool {
        matches!(self, Self::Bypassed)
    }

    #[must_use]
    pub const fn sentence(self) -> &'static str {
        match self {
            Self::Bypassed => "Zeroing allocation bypassed lazy allocation, like [malloc + touch]",
            Self::UsedLazyAllocation => "Zeroing allocation used lazy allocation, like [malloc]",
        }
    }
}

/// Classify by first/second write symmetry of the zeroing trial.
#[must_use]
pub fn classify_write_symmetry(zeroing: &BenchmarkTimes) -> BypassVerdict {
    let diff = relative_difference(zeroing.first_write, zeroing.second_write);
    BypassVerdict::from_bypassed(diff < BYPASS_THRESHOLD)
}

/// Classify by comparing allocation times of the zeroing and touched trials.
#[must_use]
pub fn classify_init_compare(zeroing: &BenchmarkTimes, touched: &BenchmarkTimes) -> BypassVerdict {
    BypassVerdict::from_bypassed(zeroing.init < touched.init)
}

/// Derived metrics. Percentages whose denominator was exactly zero are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub size_mib: f64,
    pub trial_order: TrialOrder,
    pub heuristic: BypassHeuristic,
    /// How much slower the plain first write is than its steady-state write.
    pub slowed_down_percent: Option<f64>,
    /// The same ratio framed as the gain from removing lazy allocation.
    pub speed_gain_percent: Option<f64>,
    /// Actual first-write gain of the touched strategy over plain.
    pub speed_gain_by_touch_percent: Option<f64>,
    pub zeroing_write_difference_percent: f64,
    pub write_symmetry_verdict: BypassVerdict,
    pub init_compare_verdict: BypassVerdict,
    /// Verdict of the configured heuristic.
    pub zeroing_bypassed_lazy_allocation: bool,
    /// `plain.total() - touched.total()`. Unreliable: see [`BenchmarkTimes::total`].
    pub total_saved_us: f64,
    pub total_saved_percent: Option<f64>,
    /// Largest second/third write drift across trials, when sanity writes ran.
    pub max_sanity_drift_percent: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

impl ComparisonReport {
    #[must_use]
    pub fn compute(
        plain: &BenchmarkTimes,
        zeroing: &BenchmarkTimes,
        touched: &BenchmarkTimes,
        size_mib: f64,
        trial_order: TrialOrder,
        heuristic: BypassHeuristic,
    ) -> Self {
        let slowed_down_percent =
            ratio(plain.first_write, plain.second_write).map(|r| (r - 1.0) * 100.0);
        let speed_gain_percent =
            ratio(plain.second_write, plain.first_write).map(|r| (1.0 - r) * 100.0);
        let speed_gain_by_touch_percent =
            ratio(touched.first_write, plain.first_write).map(|r| (1.0 - r) * 100.0);

        let write_symmetry_verdict = classify_write_symmetry(zeroing);
        let init_compare_verdict = classify_init_compare(zeroing, touched);
        let selected = match heuristic {
            BypassHeuristic::WriteSymmetry => write_symmetry_verdict,
            BypassHeuristic::InitCompare => init_compare_verdict,
        };

        let total_saved_us = plain.total() - touched.total();
        let total_saved_percent = ratio(total_saved_us, plain.total()).map(|r| r * 100.0);

        let max_sanity_drift_percent = [plain, zeroing, touched]
            .iter()
            .filter_map(|t| t.sanity_drift())
            .map(|d| d * 100.0)
            .reduce(f64::max);

        Self {
            size_mib,
            trial_order,
            heuristic,
            slowed_down_percent,
            speed_gain_percent,
            speed_gain_by_touch_percent,
            zeroing_write_difference_percent: relative_difference(
                zeroing.first_write,
                zeroing.second_write,
            ) * 100.0,
            write_symmetry_verdict,
            init_compare_verdict,
            zeroing_bypassed_lazy_allocation: selected.is_bypassed(),
            total_saved_us,
            total_saved_percent,
            max_sanity_drift_percent,
        }
    }

    /// Compute from trial samples in any order. Every strategy must be present.
    pub fn from_trials(
        trials: &[BenchmarkTimes],
        size_mib: f64,
        trial_order: TrialOrder,
        heuristic: BypassHeuristic,
    ) -> Result<Self, BenchError> {
        let find = |strategy: AllocationStrategy| {
            trials
                .iter()
                .find(|t| t.strategy == strategy)
                .ok_or(BenchError::MissingTrial { strategy })
        };
        Ok(Self::compute(
            find(AllocationStrategy::Plain)?,
            find(AllocationStrategy::Zeroing)?,
            find(AllocationStrategy::Touched)?,
            size_mib,
            trial_order,
            heuristic,
        ))
    }

    #[must_use]
    pub fn verdict(&self) -> BypassVerdict {
        BypassVerdict::from_bypassed(self.zeroing_bypassed_lazy_allocation)
    }

    /// Console summary block.
    #[must_use]
    pub fn render_console(&self, grouping: &NumberGrouping) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "=== TIME DIFFERENCES FROM LAZY ALLOCATION [[{} MiB buffer]] ===",
            self.size_mib
        )
        .ok();
        writeln!(out, "Trial order: {}", self.trial_order.as_str()).ok();
        writeln!(
            out,
            "Lazy allocation slowed our first write by: {}",
            fmt_percent(self.slowed_down_percent)
        )
        .ok();
        writeln!(
            out,
            "Inversely, getting rid of lazy allocation would speed up our first write by: {}",
            fmt_percent(self.speed_gain_percent)
        )
        .ok();
        writeln!(
            out,
            "Touching every page after allocation sped up our first write by: {}",
            fmt_percent(self.speed_gain_by_touch_percent)
        )
        .ok();
        writeln!(
            out,
            "(unreliable) total time saved by [malloc + touch]: {} [us] ({})",
            grouping.format_micros(self.total_saved_us),
            fmt_percent(self.total_saved_percent)
        )
        .ok();
        if let Some(drift) = self.max_sanity_drift_percent {
            writeln!(out, "Largest second/third write drift: {drift:.2}%").ok();
        }
        writeln!(out).ok();
        writeln!(
            out,
            "{} (heuristic: {}, zeroing write difference {:.2}%)",
            self.verdict().sentence(),
            self.heuristic.as_str(),
            self.zeroing_write_difference_percent
        )
        .ok();
        out
    }
}

/// `12.34%`, or `n/a` for an undefined percentage.
#[must_use]
pub fn fmt_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}%"),
        _ => String::from("n/a"),
    }
}
