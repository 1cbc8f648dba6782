//! Prime generation: a base Sieve of Eratosthenes and a block-segmented
//! enumerator for windows far from the origin.

/// Default inner block length for the segmented enumerator. Each block
/// allocates one mark byte per candidate.
pub const DEFAULT_BLOCK_LEN: u64 = 32_000_000;

/// Generate all primes up to `limit` inclusive. `limit < 2` yields an
/// empty vector.
pub fn sieve_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let mut composite = vec![false; limit as usize + 1];
    let mut p = 2u64;
    while p * p <= limit {
        if !composite[p as usize] {
            // multiples below p^2 carry a smaller prime factor
            let mut m = p * p;
            while m <= limit {
                composite[m as usize] = true;
                m += p;
            }
        }
        p += 1;
    }
    (2..=limit).filter(|&n| !composite[n as usize]).collect()
}

/// Enumerate primes in [lo, hi] in ascending order.
///
/// `base_primes` must cover [2, isqrt(hi)]. The range is walked in blocks
/// of `block_len` candidates; each block keeps a byte mark per candidate
/// and strikes multiples of every base prime starting at
/// max(p^2, first multiple >= block start).
pub fn segmented_primes(lo: u64, hi: u64, base_primes: &[u64], block_len: u64) -> Vec<u64> {
    if hi < 2 || hi < lo {
        return Vec::new();
    }
    let lo = lo.max(2);
    let block_len = block_len.max(1);
    let mut primes = Vec::new();

    let mut b_lo = lo;
    loop {
        let b_hi = hi.min(b_lo.saturating_add(block_len - 1));
        let len = (b_hi - b_lo + 1) as usize;
        let mut composite = vec![false; len];

        for &p in base_primes {
            // base_primes ascend, so every later prime also starts past
            // the block
            if p.saturating_mul(p) > b_hi {
                break;
            }
            let aligned = b_lo.div_ceil(p) * p;
            let mut j = aligned.max(p * p);
            while j <= b_hi {
                composite[(j - b_lo) as usize] = true;
                j += p;
            }
        }

        for (i, &c) in composite.iter().enumerate() {
            if !c {
                primes.push(b_lo + i as u64);
            }
        }

        if b_hi == hi {
            break;
        }
        b_lo = b_hi + 1;
    }

    primes
}
