//! Artifact index linking a run's report and log files with SHA-256 integrity.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed reading '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed writing '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single artifact entry in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: lazyalloc_core::structured_log::now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Hash `path` and record it under `kind` (`report`, `json`, `log`).
    pub fn add_file(&mut self, path: &Path, kind: &str) -> Result<&mut Self, ArtifactError> {
        let data = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.to_string(),
            sha256: hex_lower(&sha2::Sha256::digest(&data)),
            size_bytes: data.len() as u64,
        });
        Ok(self)
    }

    /// Paths whose current contents no longer match the recorded digest.
    #[must_use]
    pub fn stale_entries(&self) -> Vec<&ArtifactEntry> {
        self.artifacts
            .iter()
            .filter(|entry| {
                std::fs::read(&entry.path)
                    .map(|data| hex_lower(&sha2::Sha256::digest(&data)) != entry.sha256)
                    .unwrap_or(true)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ArtifactError> {
        let body = self.to_json()?;
        std::fs::write(path, body).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut out, "{b:02x}").ok();
    }
    out
}
