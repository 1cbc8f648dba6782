//! The witness gear: a fixed ordered set of odd primes.
//!
//! An even n is covered when some gear element q makes n - q prime. Only
//! odd q are useful: for even n and odd q, n - q is odd, a necessary
//! condition for primality above 2.

use crate::arith::{self, SMALL_PRIMES};
use crate::sieve;

/// Immutable ordered set of the first K odd primes. Built once at startup,
/// shared read-only across all workers.
#[derive(Debug, Clone)]
pub struct Gear {
    primes: Vec<u64>,
}

impl Gear {
    /// Build the gear from the first `k` odd primes (3, 5, 7, ...).
    ///
    /// The source sieve limit starts small and doubles until enough odd
    /// primes exist; a few thousand suffices for k <= 500.
    pub fn first_odd_primes(k: usize) -> Gear {
        assert!(k >= 1, "gear must hold at least one odd prime");
        let mut limit = 8_192u64;
        loop {
            let odd: Vec<u64> = sieve::sieve_primes(limit)
                .into_iter()
                .filter(|&p| p != 2)
                .collect();
            if odd.len() >= k {
                return Gear {
                    primes: odd[..k].to_vec(),
                };
            }
            limit *= 2;
        }
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// The gear elements, ascending.
    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    pub fn q_min(&self) -> u64 {
        self.primes[0]
    }

    pub fn q_max(&self) -> u64 {
        self.primes[self.primes.len() - 1]
    }

    /// Direct witness search: true iff some gear element q makes n - q
    /// prime.
    ///
    /// Each candidate p = n - q passes a wheel prefilter against the
    /// Miller-Rabin small-prime set before the full test: equality with a
    /// small prime is an immediate witness, divisibility by one rules the
    /// candidate out without an MR round.
    pub fn has_witness(&self, n: u64) -> bool {
        'gear: for &q in &self.primes {
            if q + 1 >= n {
                // primes ascend; p = n - q <= 1 from here on
                break;
            }
            let p = n - q;
            for &s in &SMALL_PRIMES {
                if p == s {
                    return true;
                }
                if p % s == 0 {
                    continue 'gear;
                }
            }
            if arith::is_prime_u64(p) {
                return true;
            }
        }
        false
    }
}
