//! Broker-compatible salted SHA-256 password hashes.
//!
//! Format: `base64(salt ‖ SHA-256(salt ‖ utf8(password)))` with a 4-byte
//! salt, the scheme the broker itself uses for
//! `rabbit_password_hashing_sha256`.
//!
//! The salt comes from a PRNG seeded with the operator-supplied seed, so
//! the same password and seed always hash to the same string. That is what
//! lets the reconciler recognise an unchanged account without the broker
//! ever accepting or revealing plaintext.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

pub use tpk_schemas::SHA256_HASHING_ALGORITHM;

pub const SALT_LEN: usize = 4;
const DIGEST_LEN: usize = 32;

/// Deterministic salted hash of `password` under `seed`.
pub fn hash_password(password: &str, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    encode(&salt, password)
}

/// True when `hash` is a well-formed salted SHA-256 hash of `password`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(raw) = STANDARD.decode(hash.trim()) else {
        return false;
    };
    if raw.len() != SALT_LEN + DIGEST_LEN {
        return false;
    }
    let (salt, digest) = raw.split_at(SALT_LEN);
    salted_digest(salt, password).as_slice() == digest
}

fn encode(salt: &[u8], password: &str) -> String {
    let digest = salted_digest(salt, password);
    let mut out = Vec::with_capacity(SALT_LEN + DIGEST_LEN);
    out.extend_from_slice(salt);
    out.extend_from_slice(&digest);
    STANDARD.encode(out)
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}
