//! Sieve-mode segment worker.
//!
//! For one segment of the coverage bitset: derive the expanded prime
//! window, enumerate candidate primes, fan n = p + q writes across
//! thread-local word buffers, OR-merge them behind the join barrier,
//! cross-check the seams against the direct witness search, and tally the
//! segment report.

use std::time::Instant;

use crate::coverage::{self, CoverageBitset};
use crate::gear::Gear;
use crate::report::CoverageReport;
use crate::{sieve, EngineError};

/// Width of each seam-verification band, in units of n (200 = ~100 evens
/// at both ends of a segment).
const SEAM_BAND_SPAN: u64 = 200;

/// Extra slots sieved on both sides of a segment so window rounding can
/// never under-count a boundary even.
fn overlap_slots(gear: &Gear) -> u64 {
    1024u64.max(2 * gear.q_max())
}

pub struct SegmentJob<'a> {
    pub index: usize,
    pub bitset: &'a CoverageBitset,
    pub gear: &'a Gear,
    /// Inner sieve block length for the prime enumerator.
    pub block_len: u64,
    /// Inner worker thread count T.
    pub threads: usize,
    /// Miss sample cap M; 0 disables sampling.
    pub miss_cap: usize,
    pub verify_seams: bool,
}

pub struct SegmentOutcome {
    pub report: CoverageReport,
    pub misses: Vec<u64>,
    pub seam_anomalies: u64,
}

/// Run the full parallel-then-merge pipeline for one segment.
pub fn run_segment(job: &SegmentJob) -> Result<SegmentOutcome, EngineError> {
    let start = Instant::now();
    let total_slots = job.bitset.total_slots();
    let e = job.bitset.segment_evens();

    let idx_start = job.index as u64 * e;
    if idx_start >= total_slots {
        // empty segment: nothing to verify, vacuously fully covered
        return Ok(SegmentOutcome {
            report: CoverageReport {
                index: job.index,
                n_start: 0,
                n_end: 0,
                covered: 0,
                total_evens: 0,
                pct: 100.0,
                seconds: start.elapsed().as_secs_f64(),
            },
            misses: Vec::new(),
            seam_anomalies: 0,
        });
    }
    let idx_end = (idx_start + e).min(total_slots) - 1;
    let n_start = coverage::even_of(idx_start);
    let n_end = coverage::even_of(idx_end);

    // Expanded slot window and the prime window derived from it. Any prime
    // able to combine with a gear element into this segment lies in
    // [n_start - q_max, n_end - q_min]; the padding absorbs the rounding.
    let pad = overlap_slots(job.gear);
    let idx_start_x = idx_start.saturating_sub(pad);
    let idx_end_x = (idx_end + pad).min(total_slots - 1);
    let n_start_x = coverage::even_of(idx_start_x);
    let n_end_x = coverage::even_of(idx_end_x);
    let p_lo = n_start_x.saturating_sub(job.gear.q_max()).max(2);
    let p_hi = n_end_x.saturating_sub(job.gear.q_min()).max(2);

    let base_primes = sieve::sieve_primes(p_hi.isqrt() + 1);
    let seg_primes = sieve::segmented_primes(p_lo, p_hi, &base_primes, job.block_len);

    let word_count = job.bitset.segment_word_count(job.index);
    let evens_here = job.bitset.evens_in_segment(job.index);
    let threads = job.threads.max(1);
    let n_primes = seg_primes.len();

    // Parallel fan-out into thread-local word buffers. The scope join is
    // the barrier: every thread-local write happens-before the merges
    // below, so the shared segment needs no atomics.
    let locals: Vec<Vec<u64>> = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for t in 0..threads {
            let chunk = &seg_primes[t * n_primes / threads..(t + 1) * n_primes / threads];
            let gear = job.gear;
            handles.push(scope.spawn(move || {
                let mut words = vec![0u64; word_count];
                for &p in chunk {
                    for &q in gear.primes() {
                        let n = p + q;
                        if n % 2 != 0 {
                            // p = 2 cannot pair with an odd gear element
                            continue;
                        }
                        let idx = coverage::slot_of(n);
                        if idx < idx_start {
                            continue;
                        }
                        let local_idx = idx - idx_start;
                        if local_idx >= evens_here {
                            // overlap write outside this segment: dropped
                            continue;
                        }
                        words[(local_idx / 64) as usize] |= 1u64 << (local_idx % 64);
                    }
                }
                words
            }));
        }
        handles
            .into_iter()
            .map(|h| h.join().expect("segment worker thread panicked"))
            .collect()
    });

    for words in &locals {
        job.bitset.merge_segment(job.index, words)?;
    }

    let mut seam_anomalies = 0u64;
    if job.verify_seams {
        seam_anomalies += verify_seam_band(
            job,
            n_start.max(6),
            (n_start + SEAM_BAND_SPAN).min(n_end),
        );
        seam_anomalies += verify_seam_band(
            job,
            n_start.max(n_end.saturating_sub(SEAM_BAND_SPAN - 2)),
            n_end,
        );
    }

    // Tally. The trivial evens 2 and 4 are excluded from statistics on the
    // first segment.
    let effective_n_start = if job.index == 0 { n_start.max(6) } else { n_start };
    let mut covered = 0u64;
    let mut misses = Vec::new();
    let mut total_evens = 0u64;
    if n_end >= effective_n_start {
        total_evens = (n_end - effective_n_start) / 2 + 1;
        let mut n = effective_n_start;
        while n <= n_end {
            if job.bitset.get(n) {
                covered += 1;
            } else if misses.len() < job.miss_cap {
                misses.push(n);
            }
            n += 2;
        }
    }

    let pct = if total_evens == 0 {
        100.0
    } else {
        covered as f64 * 100.0 / total_evens as f64
    };
    Ok(SegmentOutcome {
        report: CoverageReport {
            index: job.index,
            n_start,
            n_end,
            covered,
            total_evens,
            pct,
            seconds: start.elapsed().as_secs_f64(),
        },
        misses,
        seam_anomalies,
    })
}

/// Cross-check one boundary band: any even that the sieve left uncovered
/// but the direct witness search covers indicates an off-by-one or
/// window-truncation bug. Diagnostic only; the tally is never altered.
fn verify_seam_band(job: &SegmentJob, band_lo: u64, band_hi: u64) -> u64 {
    let mut anomalies = 0u64;
    let mut n = band_lo;
    while n <= band_hi {
        if !job.bitset.get(n) && job.gear.has_witness(n) {
            log::warn!(
                "[seg {:05}] seam anomaly: n={} has a witness but its bit is unset",
                job.index,
                n
            );
            anomalies += 1;
        }
        n += 2;
    }
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job<'a>(
        index: usize,
        bitset: &'a CoverageBitset,
        gear: &'a Gear,
        miss_cap: usize,
    ) -> SegmentJob<'a> {
        SegmentJob {
            index,
            bitset,
            gear,
            block_len: 1_000,
            threads: 2,
            miss_cap,
            verify_seams: true,
        }
    }

    #[test]
    fn test_segment_zero_small_limit() {
        // L = 100, E = 32: segment 0 holds evens 2..64.
        let bitset = CoverageBitset::new(50, 32).unwrap();
        let gear = Gear::first_odd_primes(20);
        let outcome = run_segment(&job(0, &bitset, &gear, 100)).unwrap();

        assert_eq!(outcome.report.n_start, 2);
        assert_eq!(outcome.report.n_end, 64);
        assert_eq!(outcome.report.total_evens, 30, "evens 6..64");
        assert_eq!(outcome.report.covered, 30, "all evens in [6,64] are covered");
        assert_eq!(outcome.report.pct, 100.0);
        assert!(outcome.misses.is_empty());
        assert_eq!(outcome.seam_anomalies, 0);
        assert!(!bitset.get(2), "2 has no odd-odd partition");
        assert!(!bitset.get(4), "4 has no odd-odd partition");
    }

    #[test]
    fn test_last_segment_short() {
        // L = 100, E = 32: segment 1 holds evens 66..100.
        let bitset = CoverageBitset::new(50, 32).unwrap();
        let gear = Gear::first_odd_primes(20);
        let outcome = run_segment(&job(1, &bitset, &gear, 100)).unwrap();

        assert_eq!(outcome.report.n_start, 66);
        assert_eq!(outcome.report.n_end, 100);
        assert_eq!(outcome.report.total_evens, 18);
        assert_eq!(outcome.report.covered, 18);
        assert_eq!(outcome.seam_anomalies, 0);
    }

    #[test]
    fn test_segment_order_independent() {
        let run_order = |order: &[usize]| {
            let bitset = CoverageBitset::new(500, 100).unwrap();
            let gear = Gear::first_odd_primes(30);
            let mut covered = 0u64;
            let mut total = 0u64;
            for &s in order {
                let outcome = run_segment(&job(s, &bitset, &gear, 0)).unwrap();
                covered += outcome.report.covered;
                total += outcome.report.total_evens;
            }
            let bits: Vec<bool> = (6u64..=1000).step_by(2).map(|n| bitset.get(n)).collect();
            (covered, total, bits)
        };
        let forward = run_order(&[0, 1, 2, 3, 4]);
        let backward = run_order(&[4, 2, 0, 3, 1]);
        assert_eq!(forward, backward, "segments must be independent");
    }

    #[test]
    fn test_tiny_gear_misses() {
        // Q = {3}: n is covered iff n - 3 is prime, so 94 (91 = 7*13) and
        // 12 (9 = 3*3) are misses while 6, 8, 10, 16 are covered.
        let bitset = CoverageBitset::new(500, 2_000_000_000).unwrap();
        let gear = Gear::first_odd_primes(1);
        let outcome = run_segment(&job(0, &bitset, &gear, 1_000)).unwrap();

        assert!(outcome.misses.contains(&94));
        assert!(outcome.misses.contains(&12));
        for n in [6u64, 8, 10, 16] {
            assert!(!outcome.misses.contains(&n), "{} is covered by q=3", n);
            assert!(bitset.get(n));
        }
        assert_eq!(
            outcome.report.covered + outcome.misses.len() as u64,
            outcome.report.total_evens,
            "a large enough cap samples every miss"
        );
    }

    #[test]
    fn test_miss_cap_bounds_sample() {
        let bitset = CoverageBitset::new(500, 2_000_000_000).unwrap();
        let gear = Gear::first_odd_primes(1);
        let outcome = run_segment(&job(0, &bitset, &gear, 5)).unwrap();
        assert_eq!(outcome.misses.len(), 5, "sample stops at the cap");
        assert_eq!(outcome.misses, vec![12, 18, 24, 28, 30]);
    }

    #[test]
    fn test_miss_sampling_disabled() {
        let bitset = CoverageBitset::new(500, 2_000_000_000).unwrap();
        let gear = Gear::first_odd_primes(1);
        let outcome = run_segment(&job(0, &bitset, &gear, 0)).unwrap();
        assert!(outcome.misses.is_empty());
        assert!(outcome.report.covered < outcome.report.total_evens);
    }

    #[test]
    fn test_empty_segment_trivial_report() {
        let bitset = CoverageBitset::new(50, 32).unwrap();
        let gear = Gear::first_odd_primes(5);
        let outcome = run_segment(&job(7, &bitset, &gear, 10)).unwrap();
        assert_eq!(outcome.report.total_evens, 0);
        assert_eq!(outcome.report.covered, 0);
        assert_eq!(outcome.report.pct, 100.0);
    }

    #[test]
    fn test_many_inner_threads() {
        // More threads than primes still partitions cleanly.
        let bitset = CoverageBitset::new(50, 32).unwrap();
        let gear = Gear::first_odd_primes(20);
        let mut j = job(0, &bitset, &gear, 0);
        j.threads = 64;
        let outcome = run_segment(&j).unwrap();
        assert_eq!(outcome.report.covered, 30);
    }

    #[test]
    fn test_seams_clean_across_many_segments() {
        // Narrow segments stress the boundary math; a gear this wide
        // covers every even below 10^4, so any anomaly is a window bug.
        let bitset = CoverageBitset::new(5_000, 256).unwrap();
        let gear = Gear::first_odd_primes(300);
        let mut anomalies = 0u64;
        for s in 0..bitset.segment_count() {
            let outcome = run_segment(&job(s, &bitset, &gear, 0)).unwrap();
            anomalies += outcome.seam_anomalies;
            assert_eq!(
                outcome.report.covered, outcome.report.total_evens,
                "segment {} must be fully covered",
                s
            );
        }
        assert_eq!(anomalies, 0, "no seam anomalies on a covering gear");
    }
}
