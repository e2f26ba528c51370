//! Command-line harness for the lazy-allocation benchmark.
//!
//! This crate provides:
//! - Report rendering: markdown for humans, JSON for machines
//! - Artifact index: SHA-256 digests of every file a run writes

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod render;

pub use artifacts::{ArtifactEntry, ArtifactIndex};
pub use render::{OutputFormat, render_json, render_markdown};
