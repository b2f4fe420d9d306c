//! Deterministic per-run seed derivation.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Derives the seed handed to the simulator for the run at `index`.
///
/// Seeds are obtained by hashing `(master_seed, index)` with SipHash-1-3 under
/// fixed zero keys, so the mapping is stable across platforms and releases.
/// The top bit is cleared so the value parses as a non-negative signed 64-bit
/// integer and never equals `-1`, which the simulator reads as "seed from the
/// clock".
pub fn derive_run_seed(master_seed: u64, index: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(index);
    hasher.finish() >> 1
}
