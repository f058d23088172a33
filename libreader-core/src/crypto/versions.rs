//! Key-derivation parameters per sealed-blob format version
//!
//! The version stored in a sealed blob implies its PBKDF2 iteration count:
//! - Version 1: PBKDF2-HMAC-SHA256, 100,000 iterations
//! - Version 2: PBKDF2-HMAC-SHA256, 600,000 iterations

const VERSION_1_ITERATIONS: u32 = 100_000;

const VERSION_2_ITERATIONS: u32 = 600_000;

/// Version written by [`super::seal`]
pub const CURRENT_SEAL_VERSION: u32 = 2;

/// Iteration count matching [`CURRENT_SEAL_VERSION`]
pub(super) const CURRENT_ITERATIONS: u32 = VERSION_2_ITERATIONS;

/// PBKDF2 iteration count for a sealed-blob version, `None` if unknown
pub const fn pbkdf2_iterations(version: u32) -> Option<u32> {
    match version {
        1 => Some(VERSION_1_ITERATIONS),
        2 => Some(VERSION_2_ITERATIONS),
        _ => None,
    }
}
