//! Trial execution.
//!
//! Each trial allocates a buffer with one strategy, times the allocation, two
//! (optionally three) full sequential writes, then frees the buffer before the
//! next strategy runs. Every phase is measured exactly once.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::buffer::RawBuffer;
use crate::config::BenchmarkConfig;
use crate::error::BenchError;
use crate::report::ComparisonReport;
use crate::strategy::AllocationStrategy;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, Phase};
use crate::timing::{BenchmarkTimes, time_phase};

/// Result of one full `run_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub config: BenchmarkConfig,
    /// Trials in execution order.
    pub trials: Vec<BenchmarkTimes>,
    pub report: ComparisonReport,
}

impl BenchmarkRun {
    #[must_use]
    pub fn trial(&self, strategy: AllocationStrategy) -> Option<&BenchmarkTimes> {
        self.trials.iter().find(|t| t.strategy == strategy)
    }
}

/// Runs the plain / zeroing / touched comparison for one buffer size.
#[derive(Debug, Clone)]
pub struct LazyAllocationBenchmark {
    config: BenchmarkConfig,
}

impl LazyAllocationBenchmark {
    /// Harness for `size_mib` mebibytes with default experiment settings.
    pub fn new(size_mib: usize) -> Result<Self, BenchError> {
        BenchmarkConfig::from_mib(size_mib).map(Self::with_config)
    }

    #[must_use]
    pub const fn with_config(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run all three strategies in the configured order and print the comparison.
    pub fn run_all(
        &self,
        out: &mut dyn Write,
        mut log: Option<&mut LogEmitter>,
    ) -> Result<BenchmarkRun, BenchError> {
        let order = self.config.trial_order;
        if let Some(log) = log.as_deref_mut() {
            let entry = log
                .entry(LogLevel::Info, "run.start")
                .with_buffer_bytes(self.config.buffer_size_bytes)
                .with_details(serde_json::json!({
                    "trial_order": order.as_str(),
                    "sanity_write": self.config.sanity_write,
                    "touched_pages": self.config.touched_pages(),
                    "bypass_heuristic": self.config.bypass_heuristic.as_str(),
                }));
            log.emit_entry(entry)?;
        }

        let mut trials = Vec::with_capacity(3);
        for strategy in order.strategies() {
            trials.push(self.benchmark_allocation(strategy, out, log.as_deref_mut())?);
        }

        let report = ComparisonReport::from_trials(
            &trials,
            self.config.size_mib(),
            order,
            self.config.bypass_heuristic,
        )?;

        out.write_all(report.render_console(&self.config.grouping).as_bytes())?;
        out.flush()?;

        if let Some(log) = log {
            let details = serde_json::to_value(&report).map_err(std::io::Error::other)?;
            let entry = log
                .entry(LogLevel::Info, "report.summary")
                .with_buffer_bytes(self.config.buffer_size_bytes)
                .with_outcome(Outcome::Pass)
                .with_details(details);
            log.emit_entry(entry)?;
            log.flush()?;
        }

        Ok(BenchmarkRun {
            config: self.config.clone(),
            trials,
            report,
        })
    }

    /// Run one strategy end to end: allocate, write twice (three times with the
    /// sanity write), free. Phase timings are printed as they complete.
    pub fn benchmark_allocation(
        &self,
        strategy: AllocationStrategy,
        out: &mut dyn Write,
        mut log: Option<&mut LogEmitter>,
    ) -> Result<BenchmarkTimes, BenchError> {
        let size = self.config.buffer_size_bytes;
        writeln!(
            out,
            "=== {} ({}) ===",
            strategy.label(),
            strategy.allocator_call()
        )?;
        if let Some(log) = log.as_deref_mut() {
            let entry = log
                .entry(LogLevel::Info, "trial.start")
                .with_strategy(strategy)
                .with_buffer_bytes(size);
            log.emit_entry(entry)?;
        }

        let (allocated, init) = time_phase(|| strategy.allocate(size));
        let mut buf = match allocated {
            Ok(buf) => buf,
            Err(err) => {
                if let Some(log) = log.as_deref_mut() {
                    let entry = log
                        .entry(LogLevel::Fatal, "trial.alloc_failed")
                        .with_strategy(strategy)
                        .with_buffer_bytes(size)
                        .with_outcome(Outcome::Error);
                    log.emit_entry(entry)?;
                    log.flush()?;
                }
                return Err(err);
            }
        };
        self.record_phase(strategy, Phase::Init, init, out, log.as_deref_mut())?;

        let first_write =
            self.timed_write(&mut buf, strategy, Phase::FirstWrite, out, log.as_deref_mut())?;
        let second_write =
            self.timed_write(&mut buf, strategy, Phase::SecondWrite, out, log.as_deref_mut())?;
        let mut times = BenchmarkTimes::new(strategy, init, first_write, second_write);
        if self.config.sanity_write {
            let third_write =
                self.timed_write(&mut buf, strategy, Phase::ThirdWrite, out, log.as_deref_mut())?;
            times = times.with_third_write(third_write);
        }

        writeln!(out)?;
        drop(buf);

        if let Some(log) = log {
            let entry = log
                .entry(LogLevel::Info, "trial.complete")
                .with_strategy(strategy)
                .with_buffer_bytes(size)
                .with_outcome(Outcome::Pass)
                .with_details(serde_json::json!({ "total_us": times.total() }));
            log.emit_entry(entry)?;
        }
        Ok(times)
    }

    fn timed_write(
        &self,
        buf: &mut RawBuffer,
        strategy: AllocationStrategy,
        phase: Phase,
        out: &mut dyn Write,
        log: Option<&mut LogEmitter>,
    ) -> Result<f64, BenchError> {
        let ((), micros) = time_phase(|| buf.fill_sequential());
        self.record_phase(strategy, phase, micros, out, log)?;
        Ok(micros)
    }

    fn record_phase(
        &self,
        strategy: AllocationStrategy,
        phase: Phase,
        micros: f64,
        out: &mut dyn Write,
        log: Option<&mut LogEmitter>,
    ) -> Result<(), BenchError> {
        writeln!(
            out,
            "{} time: {} [us]",
            phase.label(),
            self.config.grouping.format_micros(micros)
        )?;
        if let Some(log) = log {
            let entry: LogEntry = log
                .entry(LogLevel::Info, "trial.phase")
                .with_strategy(strategy)
                .with_phase(phase, micros);
            log.emit_entry(entry)?;
        }
        Ok(())
    }
}

impl Default for LazyAllocationBenchmark {
    fn default() -> Self {
        Self::with_config(BenchmarkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrialOrder;

    fn small(size_mib: usize) -> LazyAllocationBenchmark {
        LazyAllocationBenchmark::new(size_mib).unwrap()
    }

    #[test]
    fn default_is_sixty_four_mib() {
        let bench = LazyAllocationBenchmark::default();
        assert_eq!(bench.config().buffer_size_bytes, 64 * 1_048_576);
    }

    #[test]
    fn single_trial_prints_each_phase() {
        let bench = small(1);
        let mut out = Vec::new();
        let times = bench
            .benchmark_allocation(AllocationStrategy::Touched, &mut out, None)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("=== touched (malloc + page touch) ==="));
        for label in [
            "init time:",
            "first write time:",
            "second write time:",
            "third write time:",
        ] {
            assert!(text.contains(label), "missing {label} in {text}");
        }
        assert!(text.contains("[us]"));
        assert!(times.init >= 0.0 && times.first_write >= 0.0 && times.second_write >= 0.0);
        assert!(times.third_write.is_some());
    }

    #[test]
    fn sanity_write_can_be_disabled() {
        let cfg = BenchmarkConfig::from_mib(1).unwrap().with_sanity_write(false);
        let bench = LazyAllocationBenchmark::with_config(cfg);
        let mut out = Vec::new();
        let times = bench
            .benchmark_allocation(AllocationStrategy::Plain, &mut out, None)
            .unwrap();
        assert_eq!(times.third_write, None);
        assert!(!String::from_utf8(out).unwrap().contains("third write"));
    }

    #[test]
    fn run_all_follows_trial_order() {
        let cfg = BenchmarkConfig::from_mib(1)
            .unwrap()
            .with_trial_order(TrialOrder::TouchedFirst);
        let run = LazyAllocationBenchmark::with_config(cfg)
            .run_all(&mut std::io::sink(), None)
            .unwrap();
        let order: Vec<_> = run.trials.iter().map(|t| t.strategy).collect();
        assert_eq!(order, TrialOrder::TouchedFirst.strategies().to_vec());
        assert_eq!(run.report.trial_order, TrialOrder::TouchedFirst);
    }

    #[test]
    fn run_all_logs_every_phase() {
        let (mut emitter, capture) = LogEmitter::to_capture("unit");
        small(1)
            .run_all(&mut std::io::sink(), Some(&mut emitter))
            .unwrap();
        let entries = capture.entries();
        let count = |event: &str| entries.iter().filter(|e| e.event == event).count();
        assert_eq!(count("run.start"), 1);
        assert_eq!(count("trial.start"), 3);
        assert_eq!(count("trial.phase"), 12);
        assert_eq!(count("trial.complete"), 3);
        assert_eq!(count("report.summary"), 1);
        assert_eq!(entries.last().unwrap().event, "report.summary");
        assert!(
            entries
                .iter()
                .filter(|e| e.event == "trial.phase")
                .all(|e| e.duration_us.is_some_and(|d| d >= 0.0))
        );
    }

    #[test]
    fn allocation_failure_aborts_with_error_and_log() {
        let cfg = BenchmarkConfig {
            buffer_size_bytes: usize::MAX,
            ..BenchmarkConfig::from_mib(1).unwrap()
        };
        let (mut emitter, capture) = LogEmitter::to_capture("oom");
        let err = LazyAllocationBenchmark::with_config(cfg)
            .run_all(&mut std::io::sink(), Some(&mut emitter))
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::AllocationFailed {
                strategy: AllocationStrategy::Plain,
                ..
            }
        ));
        let entries = capture.entries();
        assert_eq!(entries.last().unwrap().event, "trial.alloc_failed");
        assert!(entries.iter().all(|e| e.event != "report.summary"));
    }
}
