//! Core of the lazy-allocation benchmark.
//!
//! This crate provides:
//! - Raw buffers acquired straight from the system allocator (`malloc` / `calloc`)
//! - The three allocation strategies: plain, zeroing, touched (pre-faulted)
//! - A single-sample trial runner timing init, first write and second write
//! - The comparison report and the zeroing-bypass classification
//! - Structured JSONL logging for trial events

pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod report;
pub mod runner;
pub mod strategy;
pub mod structured_log;
pub mod timing;

pub use config::{BenchmarkConfig, BypassHeuristic, TrialOrder};
pub use error::BenchError;
pub use report::ComparisonReport;
pub use runner::{BenchmarkRun, LazyAllocationBenchmark};
pub use strategy::AllocationStrategy;
pub use timing::BenchmarkTimes;
