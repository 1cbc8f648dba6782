//! Audit records: one JSON object per completed segment or window, plus
//! optional miss lists. The same files double as resume checkpoints.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Per-segment (or per-window) audit record. Serialized field names are the
/// on-disk audit schema and must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoverageReport {
    pub index: usize,
    pub n_start: u64,
    pub n_end: u64,
    pub covered: u64,
    pub total_evens: u64,
    pub pct: f64,
    pub seconds: f64,
}

/// `seg_NNNNN.json`, NNNNN zero-padded to 5 digits.
pub fn segment_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("seg_{:05}.json", index))
}

pub fn segment_miss_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("seg_{:05}_misses.txt", index))
}

pub fn window_path(dir: &Path, n_start: u64, window_evens: u64) -> PathBuf {
    dir.join(format!("window_{}_{}.json", n_start, window_evens))
}

pub fn window_miss_path(dir: &Path, n_start: u64, window_evens: u64) -> PathBuf {
    dir.join(format!("window_{}_{}_misses.txt", n_start, window_evens))
}

pub fn write_report(path: &Path, report: &CoverageReport) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// One decimal even per line.
pub fn write_misses(path: &Path, misses: &[u64]) -> Result<(), EngineError> {
    let mut out = String::with_capacity(misses.len() * 14);
    for n in misses {
        out.push_str(&n.to_string());
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Load a previously written report for resume. Returns None when the file
/// is absent or unreadable; the caller recomputes in that case.
pub fn load_report(path: &Path) -> Option<CoverageReport> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("failed to parse {}: {}, recomputing", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("failed to read {}: {}, recomputing", path.display(), e);
            None
        }
    }
}
