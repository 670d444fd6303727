//! Random identifiers.

use rand::Rng;

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// Used for session ids and token ids (`jti`). Guessing one is
/// computationally infeasible, and two calls never collide in practice.
pub fn random_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
