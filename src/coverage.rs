//! Segmented even-coverage bitset.
//!
//! Slot mapping is idx(n) = n/2 - 1 for even n >= 2, inverse
//! n(idx) = (idx + 1) * 2, used uniformly for writes, reads, and window
//! math. Segment s owns global slots [s*E, s*E + evens_here(s)); the last
//! segment may be shorter. In the final word of a segment, bits at or past
//! evens_here are always zero.
//!
//! The hot path never writes here: segment workers accumulate into
//! thread-local word buffers and hand them to [`CoverageBitset::merge_segment`]
//! strictly after the join barrier. The per-segment mutex serializes only
//! that merge and the subsequent single-threaded reads; distinct segments
//! never contend.

use std::sync::Mutex;

use crate::EngineError;

/// Ceilings applied to the requested evens-per-segment.
const MAX_SEGMENT_EVENS: u64 = 2_000_000_000;
const MAX_SEGMENT_WORD_SPAN: u64 = (1u64 << 31) * 64;

/// Slot index of an even n >= 2.
#[inline]
pub fn slot_of(n: u64) -> u64 {
    n / 2 - 1
}

/// The even represented by a slot index.
#[inline]
pub fn even_of(idx: u64) -> u64 {
    (idx + 1) * 2
}

struct Segment {
    evens_here: u64,
    words: Mutex<Vec<u64>>,
}

pub struct CoverageBitset {
    total_slots: u64,
    segment_evens: u64,
    segments: Vec<Segment>,
}

impl CoverageBitset {
    /// Allocate a bitset for `total_slots` evens, split into segments of
    /// (clamped) `requested_segment_evens` slots each.
    pub fn new(total_slots: u64, requested_segment_evens: u64) -> Result<Self, EngineError> {
        let segment_evens = requested_segment_evens
            .min(MAX_SEGMENT_EVENS)
            .min(MAX_SEGMENT_WORD_SPAN)
            .max(1);
        let segment_count = total_slots.div_ceil(segment_evens);
        let segment_count = usize::try_from(segment_count).map_err(|_| {
            EngineError::CapacityExceeded(format!(
                "{} segments of {} evens exceed the platform index range",
                total_slots.div_ceil(segment_evens),
                segment_evens
            ))
        })?;

        let mut segments = Vec::with_capacity(segment_count);
        for s in 0..segment_count {
            let start = s as u64 * segment_evens;
            let evens_here = segment_evens.min(total_slots - start);
            let words = usize::try_from(evens_here.div_ceil(64)).map_err(|_| {
                EngineError::CapacityExceeded(format!(
                    "segment {} needs {} words, past the platform index range",
                    s,
                    evens_here.div_ceil(64)
                ))
            })?;
            segments.push(Segment {
                evens_here,
                words: Mutex::new(vec![0u64; words]),
            });
        }

        Ok(CoverageBitset {
            total_slots,
            segment_evens,
            segments,
        })
    }

    pub fn total_slots(&self) -> u64 {
        self.total_slots
    }

    /// The clamped evens-per-segment E.
    pub fn segment_evens(&self) -> u64 {
        self.segment_evens
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Slots owned by segment `s`.
    pub fn evens_in_segment(&self, s: usize) -> u64 {
        self.segments[s].evens_here
    }

    /// Words owned by segment `s`.
    pub fn segment_word_count(&self, s: usize) -> usize {
        self.segments[s].words.lock().unwrap().len()
    }

    /// Mark the even n as covered. No-op when n is odd, below 4's slot
    /// range, or past the last slot.
    pub fn set(&self, n: u64) {
        if n < 2 || n % 2 != 0 {
            return;
        }
        let idx = slot_of(n);
        if idx >= self.total_slots {
            return;
        }
        let seg = (idx / self.segment_evens) as usize;
        let local = idx % self.segment_evens;
        let mut words = self.segments[seg].words.lock().unwrap();
        words[(local / 64) as usize] |= 1u64 << (local % 64);
    }

    /// Read the coverage bit for the even n. False for anything out of
    /// range.
    pub fn get(&self, n: u64) -> bool {
        if n < 2 || n % 2 != 0 {
            return false;
        }
        let idx = slot_of(n);
        if idx >= self.total_slots {
            return false;
        }
        let seg = (idx / self.segment_evens) as usize;
        let local = idx % self.segment_evens;
        let words = self.segments[seg].words.lock().unwrap();
        (words[(local / 64) as usize] >> (local % 64)) & 1 == 1
    }

    /// OR a thread-local word buffer into segment `s`.
    ///
    /// The only sanctioned multi-writer path: callers must have joined all
    /// producing threads first, so every thread-local write happens-before
    /// this merge.
    pub fn merge_segment(&self, s: usize, local_words: &[u64]) -> Result<(), EngineError> {
        let mut words = self.segments[s].words.lock().unwrap();
        if local_words.len() != words.len() {
            return Err(EngineError::WordCountMismatch {
                segment: s,
                expected: words.len(),
                got: local_words.len(),
            });
        }
        for (w, &l) in words.iter_mut().zip(local_words.iter()) {
            *w |= l;
        }
        // keep bits at or past evens_here zero in the final word
        let tail = self.segments[s].evens_here % 64;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_slot_mapping_round_trip() {
        assert_eq!(slot_of(2), 0);
        assert_eq!(slot_of(4), 1);
        assert_eq!(slot_of(100), 49);
        for idx in [0u64, 1, 63, 64, 1000] {
            assert_eq!(slot_of(even_of(idx)), idx);
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let bits = CoverageBitset::new(50, 32).unwrap();
        assert_eq!(bits.segment_count(), 2);
        assert!(!bits.get(6));
        bits.set(6);
        assert!(bits.get(6));
        // last representable even: idx 49 -> n = 100
        bits.set(100);
        assert!(bits.get(100));
        assert!(!bits.get(98), "unset evens stay unset");
    }

    #[test]
    fn test_set_get_out_of_range_and_odd() {
        let bits = CoverageBitset::new(50, 32).unwrap();
        bits.set(102); // idx 50, past the last slot: dropped
        assert!(!bits.get(102));
        bits.set(7); // odd: dropped
        assert!(!bits.get(7));
        bits.set(0);
        assert!(!bits.get(0));
    }

    #[test]
    fn test_segment_evens_clamp() {
        let bits = CoverageBitset::new(10, 0).unwrap();
        assert_eq!(bits.segment_evens(), 1, "requested 0 clamps to 1");
        assert_eq!(bits.segment_count(), 10);

        let bits = CoverageBitset::new(10, u64::MAX).unwrap();
        assert_eq!(
            bits.segment_evens(),
            2_000_000_000,
            "oversized requests clamp to the fixed ceiling"
        );
        assert_eq!(bits.segment_count(), 1);
    }

    #[test]
    fn test_segment_word_counts() {
        let bits = CoverageBitset::new(130, 64).unwrap();
        assert_eq!(bits.segment_count(), 3);
        assert_eq!(bits.segment_word_count(0), 1);
        assert_eq!(bits.segment_word_count(1), 1);
        // last segment holds 2 slots but still owns one word
        assert_eq!(bits.evens_in_segment(2), 2);
        assert_eq!(bits.segment_word_count(2), 1);
    }

    #[test]
    fn test_merge_segment_or_semantics() {
        let bits = CoverageBitset::new(128, 128).unwrap();
        bits.set(2); // bit 0 pre-set
        let mut local = vec![0u64; bits.segment_word_count(0)];
        local[0] = 0b110; // slots 1, 2 -> evens 4, 6
        bits.merge_segment(0, &local).unwrap();
        assert!(bits.get(2), "pre-existing bits survive the merge");
        assert!(bits.get(4));
        assert!(bits.get(6));
        assert!(!bits.get(8));
    }

    #[test]
    fn test_merge_segment_idempotent() {
        let bits = CoverageBitset::new(256, 128).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut local = vec![0u64; bits.segment_word_count(1)];
        for w in local.iter_mut() {
            *w = rng.gen();
        }
        bits.merge_segment(1, &local).unwrap();
        let snapshot: Vec<bool> = (128..256).map(|idx| bits.get(even_of(idx))).collect();
        bits.merge_segment(1, &local).unwrap();
        let again: Vec<bool> = (128..256).map(|idx| bits.get(even_of(idx))).collect();
        assert_eq!(snapshot, again, "re-merging the same payload is a no-op");
    }

    #[test]
    fn test_merge_segment_word_count_mismatch() {
        let bits = CoverageBitset::new(128, 64).unwrap();
        let err = bits.merge_segment(0, &[0u64; 3]).unwrap_err();
        match err {
            EngineError::WordCountMismatch {
                segment,
                expected,
                got,
            } => {
                assert_eq!(segment, 0);
                assert_eq!(expected, 1);
                assert_eq!(got, 3);
            }
            other => panic!("expected WordCountMismatch, got {:?}", other),
        }
    }
}
