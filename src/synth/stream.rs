//! Keyed pseudo-random source for synthetic data.
//!
//! Every value is a pure function of `(seed, index, lane)`, computed with the
//! Philox4x32-10 counter-based generator (Salmon et al., "Parallel Random
//! Numbers: As Easy as 1, 2, 3"). The seed is the key and the row index plus
//! lane form the counter, so rows can be produced in any order, on any worker,
//! and always come out the same.

// Philox round constants
const PHILOX_M4X32_0: u32 = 0xD2511F53;
const PHILOX_M4X32_1: u32 = 0xCD9E8D57;
const PHILOX_W32_0: u32 = 0x9E3779B9;
const PHILOX_W32_1: u32 = 0xBB67AE85;

/// Independent sub-streams per row. Each consumer draws from its own lane so
/// adding a draw in one place never shifts the values seen elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Lane {
    Amount = 1,
    Account = 2,
    Timestamp = 3,
    Merchant = 4,
    TransactionId = 5,
    AccountId = 6,
    FraudShuffle = 7,
    FraudPattern = 8,
    BurstAccount = 9,
    BurstAnchor = 10,
}

/// Single round of Philox mixing.
#[inline]
fn philox_round(ctr: &mut [u32; 4], key: &[u32; 2]) {
    let hi0 = ((ctr[0] as u64 * PHILOX_M4X32_0 as u64) >> 32) as u32;
    let lo0 = ctr[0].wrapping_mul(PHILOX_M4X32_0);
    let hi1 = ((ctr[2] as u64 * PHILOX_M4X32_1 as u64) >> 32) as u32;
    let lo1 = ctr[2].wrapping_mul(PHILOX_M4X32_1);

    ctr[0] = hi1 ^ ctr[1] ^ key[0];
    ctr[1] = lo1;
    ctr[2] = hi0 ^ ctr[3] ^ key[1];
    ctr[3] = lo0;
}

/// Philox4x32-10 applied to one counter block. Stateless.
#[inline]
pub fn philox4x32_10(counter: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let mut ctr = counter;
    let mut key = key;
    for _ in 0..10 {
        philox_round(&mut ctr, &key);
        key[0] = key[0].wrapping_add(PHILOX_W32_0);
        key[1] = key[1].wrapping_add(PHILOX_W32_1);
    }
    ctr
}

/// `stream(seed, index)`: the raw 64-bit value for a row on the default lane.
pub fn stream(seed: u64, index: u64) -> u64 {
    DeterministicStream::new(seed).next_u64(index, Lane::Amount)
}

/// A seed bound to the Philox key. Holds no mutable state and is `Copy`,
/// so workers share it freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicStream {
    seed: u64,
    key: [u32; 2],
}

impl DeterministicStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            key: [(seed & 0xFFFF_FFFF) as u32, (seed >> 32) as u32],
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// 128 bits for `(index, lane)`. For a fixed seed this is a bijection of
    /// the counter, so distinct `(index, lane)` pairs never collide.
    pub fn block(&self, index: u64, lane: Lane) -> [u32; 4] {
        let counter = [
            (index & 0xFFFF_FFFF) as u32,
            (index >> 32) as u32,
            lane as u32,
            0,
        ];
        philox4x32_10(counter, self.key)
    }

    /// The block as 16 bytes, little-endian per word.
    pub fn bytes(&self, index: u64, lane: Lane) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.block(index, lane)) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Two independent 64-bit values for `(index, lane)`.
    pub fn pair_u64(&self, index: u64, lane: Lane) -> (u64, u64) {
        let b = self.block(index, lane);
        (
            ((b[0] as u64) << 32) | b[1] as u64,
            ((b[2] as u64) << 32) | b[3] as u64,
        )
    }

    pub fn next_u64(&self, index: u64, lane: Lane) -> u64 {
        self.pair_u64(index, lane).0
    }

    /// Uniform in (0, 1]. Never zero, so it is safe under `ln`.
    pub fn uniform(&self, index: u64, lane: Lane) -> f64 {
        to_open_unit(self.next_u64(index, lane))
    }

    /// Two independent uniforms in (0, 1].
    pub fn uniform_pair(&self, index: u64, lane: Lane) -> (f64, f64) {
        let (a, b) = self.pair_u64(index, lane);
        (to_open_unit(a), to_open_unit(b))
    }

    /// Uniform integer in `[0, bound)` via widening multiply. `bound` must be > 0.
    pub fn below(&self, index: u64, lane: Lane, bound: u64) -> u64 {
        debug_assert!(bound > 0);
        ((self.next_u64(index, lane) as u128 * bound as u128) >> 64) as u64
    }
}

/// Upper 53 bits mapped onto (0, 1].
#[inline]
fn to_open_unit(x: u64) -> f64 {
    ((x >> 11) + 1) as f64 * (1.0 / (1u64 << 53) as f64)
}
