//! Cryptographic primitives for keystore verification.
//!
//! Provides the Keccak sponge, scrypt with its Salsa20/8 mixing core, and the
//! per-candidate MAC check built on both.

pub mod kdf;
pub mod keccak;
pub mod salsa;
pub mod scrypt;
pub mod verify;

pub use kdf::{KdfParams, derive_key};
pub use keccak::{KECCAK_DOMAIN, KeccakBits, SHA3_DOMAIN, keccak256};
pub use scrypt::{Scratch, ScryptParams};
pub use verify::{CipherRecord, Verifier, compute_mac, expected_mac, verify};

/// Start of the MAC-derivation half of the derived key.
pub const MAC_KEY_START: usize = 16;
/// End of the MAC-derivation half; also the minimum derived key length.
pub const MAC_KEY_END: usize = 32;
/// Length of the Keccak-256 MAC.
pub const MAC_LEN: usize = 32;
