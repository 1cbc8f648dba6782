//! Empirical verification of the even Goldbach conjecture by witness-set
//! reduction.
//!
//! Instead of searching all prime partitions of each even n, a fixed gear Q
//! of the first K odd primes is built once, and n counts as covered iff some
//! q in Q makes n - q prime. Two regimes share that reduction:
//!
//! 1. Sieve mode: evens in [4, L] are packed into a segmented coverage
//!    bitset; each segment enumerates candidate primes in an expanded
//!    window and fans p + q writes across thread-local buffers that are
//!    OR-merged behind a join barrier.
//! 2. MR mode: sparse windows near 2^60 test each even directly with a
//!    deterministic 64-bit Miller-Rabin witness search.
//!
//! Every completed segment or window leaves a JSON audit record, which also
//! serves as the resume checkpoint.

pub mod affinity;
pub mod arith;
pub mod coverage;
pub mod gear;
pub mod report;
pub mod run;
pub mod segment;
pub mod sieve;
pub mod window;

/// Errors surfaced by the verification engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("coverage bitset capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("segment {segment}: thread-local word count {got} does not match segment word count {expected}")]
    WordCountMismatch {
        segment: usize,
        expected: usize,
        got: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
