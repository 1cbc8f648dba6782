//! MR-mode window worker: direct witness search for sparse high windows.
//!
//! No bitset here. Each even in the window is tested independently with
//! the wheel-prefiltered Miller-Rabin search; a single atomic counter
//! accumulates coverage and a mutex-guarded buffer collects the first
//! misses up to the sample cap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;

use crate::gear::Gear;
use crate::report::CoverageReport;
use crate::EngineError;

pub struct WindowJob<'a> {
    /// First even of the window.
    pub n_start: u64,
    pub window_evens: u64,
    pub gear: &'a Gear,
    /// Inner worker thread count T.
    pub threads: usize,
    /// Miss sample cap M; 0 disables sampling.
    pub miss_cap: usize,
}

#[derive(Debug)]
pub struct WindowOutcome {
    pub report: CoverageReport,
    pub misses: Vec<u64>,
}

pub fn run_window(job: &WindowJob) -> Result<WindowOutcome, EngineError> {
    let start = Instant::now();
    if job.window_evens == 0 {
        return Err(EngineError::Config("windowEvens must be positive".into()));
    }
    let n_end = job
        .n_start
        .checked_add(2 * (job.window_evens - 1))
        .ok_or_else(|| {
            EngineError::Config(format!(
                "window [{} + 2*{}) exceeds the 64-bit range",
                job.n_start, job.window_evens
            ))
        })?;

    let covered = AtomicU64::new(0);
    let misses: Mutex<Vec<u64>> = Mutex::new(Vec::new());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(job.threads.max(1))
        .build()
        .map_err(|e| EngineError::Config(format!("failed to build thread pool: {}", e)))?;

    pool.install(|| {
        (0..job.window_evens).into_par_iter().for_each(|i| {
            let n = job.n_start + 2 * i;
            if job.gear.has_witness(n) {
                covered.fetch_add(1, Ordering::Relaxed);
            } else if job.miss_cap > 0 {
                let mut buf = misses.lock().unwrap();
                if buf.len() < job.miss_cap {
                    buf.push(n);
                }
            }
        });
    });

    let covered = covered.into_inner();
    let mut misses = misses.into_inner().unwrap();
    // parallel arrival order is meaningless; report misses ascending
    misses.sort_unstable();

    let pct = covered as f64 * 100.0 / job.window_evens as f64;
    Ok(WindowOutcome {
        report: CoverageReport {
            index: 0,
            n_start: job.n_start,
            n_end,
            covered,
            total_evens: job.window_evens,
            pct,
            seconds: start.elapsed().as_secs_f64(),
        },
        misses,
    })
}
