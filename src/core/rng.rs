//! Seeded Round Randomness
//!
//! Crash points come from a Xorshift128+ generator seeded per round.
//! The round seed is derived from the server seed and the round id, so the
//! draw can be reproduced (and checked by players) once the seed is revealed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Xorshift128+ PRNG.
///
/// Same seed, same sequence, on every platform.
///
/// ```
/// use crash_server::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(7);
/// let mut b = DeterministicRng::new(7);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl DeterministicRng {
    /// Create a generator from a 64-bit seed.
    ///
    /// The two state words are expanded with SplitMix64 so that small or
    /// sequential seeds still start from well-mixed state.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let a = splitmix64(&mut s);
        let b = splitmix64(&mut s);

        // All-zero state would stick at zero forever
        let state = if a == 0 && b == 0 { [1, 1] } else { [a, b] };
        Self { state }
    }

    /// Next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Integer in `[0, max)`. Returns 0 when `max` is 0.
    ///
    /// Plain modulo; the bias over a 64-bit source is negligible for the
    /// small ranges drawn here.
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed for one round.
///
/// `SHA-256("CRASH_ROUND_SEED_V1" ‖ server_seed ‖ round_id)`, first 8 bytes
/// little-endian. The server seed is secret; the round id is public.
pub fn derive_round_seed(server_seed: u64, round_id: &[u8; 16]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"CRASH_ROUND_SEED_V1");
    hasher.update(server_seed.to_le_bytes());
    hasher.update(round_id);
    let hash = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(head)
}
