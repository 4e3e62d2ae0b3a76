use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::observability::MetricsSnapshot;
use crate::pipeline::{PipelineResult, SkippedImage};

/// Summary of a finished run, written as JSON with `--report`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub output_size_bytes: u64,
    pub output_sha256: String,
    pub page_count: usize,
    pub pages: Vec<String>,
    pub skipped: Vec<SkippedImage>,
    pub brightness: String,
    pub completed_at: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn build(
        result: &PipelineResult,
        brightness: &str,
        metrics: MetricsSnapshot,
    ) -> Result<Self> {
        let output_size_bytes = fs::metadata(&result.output)
            .with_context(|| format!("Failed to stat output PDF: {}", result.output.display()))?
            .len();
        Ok(Self {
            input: result.input.clone(),
            output: result.output.clone(),
            output_size_bytes,
            output_sha256: compute_sha256(&result.output)?,
            page_count: result.pages.len(),
            pages: result.pages.clone(),
            skipped: result.skipped.clone(),
            brightness: brightness.to_string(),
            completed_at: Utc::now(),
            metrics,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory: {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Failed to write report JSON: {}", path.display()))?;
        Ok(())
    }
}

/// Compute the SHA256 digest of the file at `path` and return it as a hex string.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
