//! Modular arithmetic primitives for u64 with u128 intermediates.

/// Small primes tried by trial division ahead of Miller-Rabin. The same set
/// doubles as the wheel prefilter in witness search.
pub const SMALL_PRIMES: [u64; 16] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53,
];

/// Miller-Rabin bases sufficient to make the test deterministic for every
/// n < 3.3 * 10^24, which covers all of u64.
const MR_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// a * b mod m without overflow.
#[inline]
pub fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

/// Modular exponentiation: base^exp mod m using the right-to-left binary
/// method.
pub fn mod_pow(base: u64, mut exp: u64, m: u64) -> u64 {
    if m == 1 {
        return 0;
    }
    let m = m as u128;
    let mut result = 1u128;
    let mut b = base as u128 % m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % m;
        }
        exp >>= 1;
        b = b * b % m;
    }
    result as u64
}

/// Deterministic Miller-Rabin primality test for all 64-bit inputs.
///
/// Trial-divides by [`SMALL_PRIMES`] first, then runs the witness loop over
/// [`MR_BASES`]. All products go through u128.
pub fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &s in &SMALL_PRIMES {
        if n == s {
            return true;
        }
        if n % s == 0 {
            return false;
        }
    }

    // Write n-1 = 2^s * d with d odd. n is odd here, so s >= 1.
    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'base: for &a in &MR_BASES {
        if a % n == 0 {
            continue;
        }
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..s - 1 {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'base;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Trial-division oracle for cross-checking.
    fn is_prime_slow(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2u64;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn test_mod_pow_basic() {
        assert_eq!(mod_pow(2, 10, 1000), 24);
        assert_eq!(mod_pow(3, 0, 7), 1);
        assert_eq!(mod_pow(5, 690, 691), 1); // Fermat's little theorem
        assert_eq!(mod_pow(0, 5, 7), 0);
        assert_eq!(mod_pow(7, 1, 7), 0);
        assert_eq!(mod_pow(2, 64, u64::MAX), 1); // 2^64 mod (2^64 - 1)
    }

    #[test]
    fn test_mul_mod_near_overflow() {
        let m = u64::MAX - 58; // largest 64-bit prime
        assert_eq!(mul_mod(m - 1, m - 1, m), 1);
        assert_eq!(mul_mod(m - 1, 2, m), m - 2);
    }

    #[test]
    fn test_is_prime_corner_vector() {
        // Known corner cases, including strong pseudoprimes to small bases.
        let cases: [(u64, bool); 9] = [
            (1, false),
            (2, true),
            (3, true),
            (4, false),
            (25, false),
            (2047, false),                 // 23 * 89, fools base 2 alone
            (3215031751, false),           // 151 * 751 * 28351
            (3825123056546413051, false),  // smallest SPSP to bases 2..23
            (u64::MAX - 58, true),         // 2^64 - 59, largest 64-bit prime
        ];
        for (n, expected) in cases {
            assert_eq!(
                is_prime_u64(n),
                expected,
                "is_prime_u64({}) should be {}",
                n,
                expected
            );
        }
    }

    #[test]
    fn test_is_prime_small_primes() {
        for &s in &SMALL_PRIMES {
            assert!(is_prime_u64(s), "{} is prime", s);
            if s > 2 {
                assert!(!is_prime_u64(s * s), "{} is composite", s * s);
            }
        }
    }

    #[test]
    fn test_is_prime_matches_oracle_dense() {
        for n in 0..20_000u64 {
            assert_eq!(
                is_prime_u64(n),
                is_prime_slow(n),
                "disagreement with trial division at n={}",
                n
            );
        }
    }

    #[test]
    fn test_is_prime_matches_oracle_sampled() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..2_000 {
            let n = rng.gen_range(0..10_000_000u64);
            assert_eq!(
                is_prime_u64(n),
                is_prime_slow(n),
                "disagreement with trial division at n={}",
                n
            );
        }
    }
}
