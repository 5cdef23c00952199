//! Keystore record parsing.
//!
//! Only the `crypto` section of the JSON record is read:
//!
//! ```text
//! { "crypto": { "cipher": "aes-128-ctr", "ciphertext": HEX,
//!               "kdf": "scrypt",
//!               "kdfparams": { "n": N, "r": R, "p": P, "dklen": LEN, "salt": HEX },
//!               "mac": HEX } }
//! ```
//!
//! Other fields (`cipherparams`, `id`, `version`, `address`, ...) are ignored.

use serde::Deserialize;

use crate::crypto::{CipherRecord, KdfParams};
use crate::error::{RecoveryError, RecoveryResult};

/// The only key derivation function this tool can check.
pub const SUPPORTED_KDF: &str = "scrypt";
/// The only cipher this tool accepts.
pub const SUPPORTED_CIPHER: &str = "aes-128-ctr";

#[derive(Deserialize)]
struct RawKeystore {
    #[serde(alias = "Crypto")]
    crypto: RawCrypto,
}

#[derive(Deserialize)]
struct RawCrypto {
    cipher: String,
    ciphertext: String,
    kdf: String,
    // only interpreted once the kdf is known to be scrypt
    kdfparams: serde_json::Value,
    mac: String,
}

#[derive(Deserialize)]
struct RawScryptParams {
    n: u64,
    r: u32,
    p: u32,
    dklen: usize,
    salt: String,
}

/// A parsed keystore: scrypt parameters plus the ciphertext/MAC pair.
///
/// Both halves are immutable for the lifetime of a search.
#[derive(Debug, Clone)]
pub struct Keystore {
    kdf: KdfParams,
    record: CipherRecord,
}

impl Keystore {
    pub fn new(kdf: KdfParams, record: CipherRecord) -> Self {
        Self { kdf, record }
    }

    /// Returns the KDF parameters used for key derivation.
    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    /// Returns the ciphertext and the MAC to match.
    pub fn record(&self) -> &CipherRecord {
        &self.record
    }

    /// Parses a JSON keystore record.
    ///
    /// # Errors
    ///
    /// Checks run in this order and stop at the first failure:
    /// - the JSON structure is malformed
    /// - the cipher is not `aes-128-ctr`
    /// - the kdf is not `scrypt`
    /// - the scrypt parameters are missing or mistyped
    /// - a hex field does not decode
    /// - the scrypt parameters are out of range
    pub fn parse(data: &[u8]) -> RecoveryResult<Self> {
        let raw: RawKeystore = serde_json::from_slice(data)?;
        let crypto = raw.crypto;

        if crypto.cipher != SUPPORTED_CIPHER {
            return Err(RecoveryError::UnsupportedCipher(crypto.cipher));
        }
        if crypto.kdf != SUPPORTED_KDF {
            return Err(RecoveryError::UnsupportedKdf(crypto.kdf));
        }

        if !crypto.kdfparams.is_object() {
            return Err(RecoveryError::MalformedRecord(
                "kdfparams must be an object".into(),
            ));
        }
        let params: RawScryptParams = serde_json::from_value(crypto.kdfparams)?;

        let salt = decode_hex("salt", &params.salt)?;
        let ciphertext = decode_hex("ciphertext", &crypto.ciphertext)?;
        let mac = decode_hex("mac", &crypto.mac)?;

        let kdf = KdfParams::new(params.n, params.r, params.p, params.dklen, salt)?;
        Ok(Self::new(kdf, CipherRecord::new(ciphertext, mac)))
    }
}

fn decode_hex(field: &'static str, value: &str) -> RecoveryResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|source| RecoveryError::Hex { field, source })
}
