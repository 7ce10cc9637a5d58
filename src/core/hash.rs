//! Seed Commitment
//!
//! A running round publishes `SHA-256(domain ‖ seed)` instead of its seed.
//! After the crash the seed is revealed and anyone can recompute both the
//! commitment and the crash point.

use sha2::{Digest, Sha256};

/// 32-byte SHA-256 output.
pub type SeedHash = [u8; 32];

/// Commitment to a round seed.
pub fn commit_seed(seed: u64) -> SeedHash {
    let mut hasher = Sha256::new();
    hasher.update(b"CRASH_SEED_COMMIT_V1");
    hasher.update(seed.to_le_bytes());
    let hash = hasher.finalize();

    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Hex form of [`commit_seed`], as shown to clients.
pub fn commit_seed_hex(seed: u64) -> String {
    hex::encode(commit_seed(seed))
}

/// Check a revealed seed against a published hex commitment.
pub fn verify_seed(seed: u64, commitment_hex: &str) -> bool {
    commit_seed_hex(seed).eq_ignore_ascii_case(commitment_hex)
}
