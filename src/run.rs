//! Run orchestration: segment partition, bounded parallel dispatch,
//! checkpoint resume, and aggregation.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::coverage::CoverageBitset;
use crate::gear::Gear;
use crate::report::{self, CoverageReport};
use crate::segment::{run_segment, SegmentJob};
use crate::window::{run_window, WindowJob};
use crate::{sieve, EngineError};

/// Knobs shared by both execution regimes.
pub struct RunConfig {
    /// Gear size K (odd primes).
    pub gear_size: usize,
    /// Inner worker thread count T.
    pub threads_inside: usize,
    /// Outer cap on simultaneously active segments.
    pub max_concurrent_segments: usize,
    /// Requested evens per segment E (clamped by the bitset).
    pub segment_evens: u64,
    /// Inner sieve block length B.
    pub block_len: u64,
    /// Miss sample cap M per segment or window; 0 disables.
    pub miss_cap: usize,
    pub resume: bool,
    pub verify_seams: bool,
    /// Directory receiving audit files.
    pub out_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        RunConfig {
            gear_size: 310,
            threads_inside: threads,
            max_concurrent_segments: 1,
            segment_evens: 2_000_000_000,
            block_len: sieve::DEFAULT_BLOCK_LEN,
            miss_cap: 0,
            resume: false,
            verify_seams: true,
            out_dir: PathBuf::from("."),
        }
    }
}

/// Aggregate over all completed segments or one window.
pub struct RunSummary {
    pub covered: u64,
    pub total_evens: u64,
    pub pct: f64,
    /// Per-segment reports; None marks a failed segment.
    pub reports: Vec<Option<CoverageReport>>,
}

/// Dense verification of all evens in [4, limit]. Limits below the first
/// material even simply tally zero verifiable evens.
pub fn run_sieve(limit: u64, cfg: &RunConfig) -> Result<RunSummary, EngineError> {
    let gear = Gear::first_odd_primes(cfg.gear_size);
    println!(
        "[gear] K={} odd primes, Q_min={}, Q_max={}",
        gear.len(),
        gear.q_min(),
        gear.q_max()
    );

    let total_slots = limit / 2;
    let bitset = CoverageBitset::new(total_slots, cfg.segment_evens)?;
    println!(
        "[Bitset] {} slots in {} segments of {} evens (~{} MiB)",
        bitset.total_slots(),
        bitset.segment_count(),
        bitset.segment_evens(),
        bitset.total_slots() / 8 / (1 << 20)
    );

    let segment_count = bitset.segment_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.max_concurrent_segments.max(1))
        .build()
        .map_err(|e| EngineError::Config(format!("failed to build thread pool: {}", e)))?;

    let reports: Vec<Option<CoverageReport>> = pool.install(|| {
        (0..segment_count)
            .into_par_iter()
            .map(|s| {
                if cfg.resume {
                    if let Some(r) = report::load_report(&report::segment_path(&cfg.out_dir, s)) {
                        println!(
                            "[seg {:05}] resumed from checkpoint: {}/{} covered",
                            s, r.covered, r.total_evens
                        );
                        return Ok(Some(r));
                    }
                }
                match process_segment(s, &bitset, &gear, cfg) {
                    Ok(r) => Ok(Some(r)),
                    // broken invariants mean the partition math itself is
                    // wrong; stop the run
                    Err(e @ EngineError::WordCountMismatch { .. }) => Err(e),
                    Err(e @ EngineError::CapacityExceeded(_)) => Err(e),
                    Err(e) => {
                        log::error!("[seg {:05}] failed: {}", s, e);
                        Ok(None)
                    }
                }
            })
            .collect::<Result<Vec<_>, EngineError>>()
    })?;

    let covered: u64 = reports.iter().flatten().map(|r| r.covered).sum();
    let total_evens: u64 = reports.iter().flatten().map(|r| r.total_evens).sum();
    let pct = if total_evens == 0 {
        100.0
    } else {
        covered as f64 * 100.0 / total_evens as f64
    };
    let failed = reports.iter().filter(|r| r.is_none()).count();
    if failed > 0 {
        log::error!("{} of {} segments failed and are excluded", failed, segment_count);
    }
    println!(
        "[TOTAL] covered {}/{} evens in [6, {}] ({:.6}%)",
        covered, total_evens, limit, pct
    );

    Ok(RunSummary {
        covered,
        total_evens,
        pct,
        reports,
    })
}

fn process_segment(
    s: usize,
    bitset: &CoverageBitset,
    gear: &Gear,
    cfg: &RunConfig,
) -> Result<CoverageReport, EngineError> {
    let outcome = run_segment(&SegmentJob {
        index: s,
        bitset,
        gear,
        block_len: cfg.block_len,
        threads: cfg.threads_inside,
        miss_cap: cfg.miss_cap,
        verify_seams: cfg.verify_seams,
    })?;
    report::write_report(&report::segment_path(&cfg.out_dir, s), &outcome.report)?;
    if !outcome.misses.is_empty() {
        report::write_misses(&report::segment_miss_path(&cfg.out_dir, s), &outcome.misses)?;
    }
    let seam_note = if outcome.seam_anomalies > 0 {
        format!(" [{} seam anomalies]", outcome.seam_anomalies)
    } else {
        String::new()
    };
    println!(
        "[seg {:05}] n=[{}..{}] covered {}/{} ({:.6}%) in {:.2}s{}",
        s,
        outcome.report.n_start,
        outcome.report.n_end,
        outcome.report.covered,
        outcome.report.total_evens,
        outcome.report.pct,
        outcome.report.seconds,
        seam_note
    );
    Ok(outcome.report)
}

/// Sparse verification of one even window starting at `n_start`.
pub fn run_mr(n_start: u64, window_evens: u64, cfg: &RunConfig) -> Result<RunSummary, EngineError> {
    if n_start == 0 || n_start % 2 != 0 {
        return Err(EngineError::Config(format!(
            "startN must be a positive even, got {}",
            n_start
        )));
    }
    let gear = Gear::first_odd_primes(cfg.gear_size);
    println!(
        "[gear] K={} odd primes, Q_min={}, Q_max={}",
        gear.len(),
        gear.q_min(),
        gear.q_max()
    );

    let outcome = run_window(&WindowJob {
        n_start,
        window_evens,
        gear: &gear,
        threads: cfg.threads_inside,
        miss_cap: cfg.miss_cap,
    })?;
    report::write_report(
        &report::window_path(&cfg.out_dir, n_start, window_evens),
        &outcome.report,
    )?;
    if !outcome.misses.is_empty() {
        report::write_misses(
            &report::window_miss_path(&cfg.out_dir, n_start, window_evens),
            &outcome.misses,
        )?;
    }
    println!(
        "[window] n=[{}..{}] covered {}/{} ({:.6}%) in {:.2}s",
        outcome.report.n_start,
        outcome.report.n_end,
        outcome.report.covered,
        outcome.report.total_evens,
        outcome.report.pct,
        outcome.report.seconds
    );

    let report = outcome.report;
    Ok(RunSummary {
        covered: report.covered,
        total_evens: report.total_evens,
        pct: report.pct,
        reports: vec![Some(report)],
    })
}
