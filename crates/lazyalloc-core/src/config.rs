//! Benchmark configuration.
//!
//! The buffer size is the only value taken from the command line. The remaining
//! knobs are experiment variables read from the environment:
//! - `LAZYALLOC_TRIAL_ORDER`: `plain-first` (default) or `touched-first`.
//!   Freed memory can stay resident between trials of one process, so the order
//!   in which strategies run is part of the experiment and is always reported.
//! - `LAZYALLOC_SANITY_WRITE`: `on` (default) performs a third write per trial.
//! - `LAZYALLOC_BYPASS_HEURISTIC`: `write-symmetry` (default) or `init-compare`.
//! - `LAZYALLOC_GROUP_SEPARATOR`: thousands separator for console output (`,`).
//!
//! Unrecognized values fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::format::NumberGrouping;
use crate::strategy::AllocationStrategy;

/// Page stride used by the touch pass.
pub const PAGE_SIZE: usize = 4096;
pub const BYTES_PER_MIB: usize = 1024 * 1024;
pub const DEFAULT_SIZE_MIB: usize = 64;

pub const ENV_TRIAL_ORDER: &str = "LAZYALLOC_TRIAL_ORDER";
pub const ENV_SANITY_WRITE: &str = "LAZYALLOC_SANITY_WRITE";
pub const ENV_BYPASS_HEURISTIC: &str = "LAZYALLOC_BYPASS_HEURISTIC";
pub const ENV_GROUP_SEPARATOR: &str = "LAZYALLOC_GROUP_SEPARATOR";

/// Order in which the three strategies are run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialOrder {
    /// plain, zeroing, touched.
    #[default]
    PlainFirst,
    /// touched, plain, zeroing.
    TouchedFirst,
}

impl TrialOrder {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "touched-first" | "touched_first" | "touch-first" | "touched" => Self::TouchedFirst,
            _ => Self::PlainFirst,
        }
    }

    #[must_use]
    pub const fn strategies(self) -> [AllocationStrategy; 3] {
        match self {
            Self::PlainFirst => [
                AllocationStrategy::Plain,
                AllocationStrategy::Zeroing,
                AllocationStrategy::Touched,
            ],
            Self::TouchedFirst => [
                AllocationStrategy::Touched,
                AllocationStrategy::Plain,
                AllocationStrategy::Zeroing,
            ],
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlainFirst => "plain-first",
            Self::TouchedFirst => "touched-first",
        }
    }
}

/// How the zeroing strategy is classified as bypassing lazy allocation or not.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BypassHeuristic {
    /// First vs second write of the zeroing trial differ by less than 5%.
    #[default]
    WriteSymmetry,
    /// Zeroing init was faster than the touched init. Kept for comparison only;
    /// it is sensitive to allocator caching between trials.
    InitCompare,
}

impl BypassHeuristic {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "init-compare" | "init_compare" | "init" | "legacy" => Self::InitCompare,
            _ => Self::WriteSymmetry,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WriteSymmetry => "write-symmetry",
            Self::InitCompare => "init-compare",
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Immutable configuration of one benchmark harness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub buffer_size_bytes: usize,
    pub trial_order: TrialOrder,
    pub sanity_write: bool,
    pub bypass_heuristic: BypassHeuristic,
    pub grouping: NumberGrouping,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            buffer_size_bytes: DEFAULT_SIZE_MIB * BYTES_PER_MIB,
            trial_order: TrialOrder::default(),
            sanity_write: true,
            bypass_heuristic: BypassHeuristic::default(),
            grouping: NumberGrouping::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Build a config for `size_mib` mebibytes with default experiment settings.
    pub fn from_mib(size_mib: usize) -> Result<Self, BenchError> {
        if size_mib == 0 {
            return Err(BenchError::ZeroSize);
        }
        let buffer_size_bytes = size_mib
            .checked_mul(BYTES_PER_MIB)
            .ok_or(BenchError::SizeOverflow { mib: size_mib })?;
        Ok(Self {
            buffer_size_bytes,
            ..Self::default()
        })
    }

    /// Build a config for `size_mib`, reading experiment settings from the process environment.
    pub fn from_env(size_mib: usize) -> Result<Self, BenchError> {
        Self::from_mib(size_mib).map(|cfg| cfg.apply_vars(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a key lookup (the environment in production).
    #[must_use]
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(ENV_TRIAL_ORDER) {
            self.trial_order = TrialOrder::from_str_loose(&raw);
        }
        if let Some(raw) = lookup(ENV_SANITY_WRITE)
            && let Some(on) = parse_switch(&raw)
        {
            self.sanity_write = on;
        }
        if let Some(raw) = lookup(ENV_BYPASS_HEURISTIC) {
            self.bypass_heuristic = BypassHeuristic::from_str_loose(&raw);
        }
        if let Some(raw) = lookup(ENV_GROUP_SEPARATOR)
            && let Some(sep) = single_char(&raw)
        {
            self.grouping.separator = sep;
        }
        self
    }

    #[must_use]
    pub fn with_trial_order(mut self, order: TrialOrder) -> Self {
        self.trial_order = order;
        self
    }

    #[must_use]
    pub fn with_sanity_write(mut self, enabled: bool) -> Self {
        self.sanity_write = enabled;
        self
    }

    #[must_use]
    pub fn with_bypass_heuristic(mut self, heuristic: BypassHeuristic) -> Self {
        self.bypass_heuristic = heuristic;
        self
    }

    #[must_use]
    pub fn with_grouping(mut self, grouping: NumberGrouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Buffer size in MiB, fractional when the byte count is not a whole multiple.
    #[must_use]
    pub fn size_mib(&self) -> f64 {
        self.buffer_size_bytes as f64 / BYTES_PER_MIB as f64
    }

    /// Number of pages the touch pass visits.
    #[must_use]
    pub const fn touched_pages(&self) -> usize {
        self.buffer_size_bytes.div_ceil(PAGE_SIZE)
    }
}

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
