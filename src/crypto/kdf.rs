use zeroize::Zeroizing;

use super::scrypt::{self, Scratch, ScryptParams};
use super::MAC_KEY_END;
use crate::error::{RecoveryError, RecoveryResult};

/// Largest derived key a keystore may ask for. Every worker allocates a key
/// buffer of this size, so it is checked when the parameters are loaded.
pub const MAX_DKLEN: usize = 1 << 16;

/// Immutable scrypt parameter snapshot loaded from a keystore.
///
/// Built once per run and shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    scrypt: ScryptParams,
    dklen: usize,
    salt: Vec<u8>,
}

impl KdfParams {
    pub fn new(n: u64, r: u32, p: u32, dklen: usize, salt: Vec<u8>) -> RecoveryResult<Self> {
        let params = Self {
            scrypt: ScryptParams::new(n, r, p)?,
            dklen,
            salt,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn scrypt(&self) -> &ScryptParams {
        &self.scrypt
    }

    pub fn n(&self) -> u64 {
        self.scrypt.n()
    }

    pub fn r(&self) -> u32 {
        self.scrypt.r()
    }

    pub fn p(&self) -> u32 {
        self.scrypt.p()
    }

    pub fn dklen(&self) -> usize {
        self.dklen
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn validate(&self) -> RecoveryResult<()> {
        if self.dklen < MAC_KEY_END {
            return Err(RecoveryError::InvalidKdfParams(format!(
                "dklen must be at least {MAC_KEY_END}, got {}",
                self.dklen
            )));
        }
        scrypt::check_output_len(self.dklen)?;
        if self.dklen > MAX_DKLEN {
            return Err(RecoveryError::InvalidKdfParams(format!(
                "dklen must be at most {MAX_DKLEN}, got {}",
                self.dklen
            )));
        }
        Ok(())
    }
}

/// Derive `dklen` bytes of key material from `password`.
pub fn derive_key(password: &str, kdf: &KdfParams) -> RecoveryResult<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(vec![0u8; kdf.dklen]);
    scrypt::scrypt(password.as_bytes(), &kdf.salt, &kdf.scrypt, &mut key)?;
    Ok(key)
}

/// Like [`derive_key`], reusing a worker's scratch memory and output buffer.
pub fn derive_key_into(
    scratch: &mut Scratch,
    password: &str,
    kdf: &KdfParams,
    key: &mut [u8],
) -> RecoveryResult<()> {
    if scratch.params() != &kdf.scrypt {
        return Err(RecoveryError::Kdf(
            "scratch memory was sized for different scrypt parameters".into(),
        ));
    }
    scrypt::scrypt_with(scratch, password.as_bytes(), &kdf.salt, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params(salt: &[u8]) -> KdfParams {
        KdfParams::new(16, 1, 1, 32, salt.to_vec()).unwrap()
    }

    #[test]
    fn kdf_is_deterministic() {
        let kdf = test_params(&[42u8; 16]);

        let k1 = derive_key("password", &kdf).unwrap();
        let k2 = derive_key("password", &kdf).unwrap();

        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 32);
    }

    #[test]
    fn kdf_params_affect_output() {
        let salt = vec![7u8; 16];
        let kdf1 = KdfParams::new(16, 1, 1, 32, salt.clone()).unwrap();
        let kdf2 = KdfParams::new(32, 1, 1, 32, salt).unwrap();

        let k1 = derive_key("pw", &kdf1).unwrap();
        let k2 = derive_key("pw", &kdf2).unwrap();

        assert_ne!(k1, k2);
    }

    #[test]
    fn salt_affects_output() {
        let k1 = derive_key("pw", &test_params(&[1u8; 16])).unwrap();
        let k2 = derive_key("pw", &test_params(&[2u8; 16])).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn kdf_invalid_params_fail_gracefully() {
        assert!(KdfParams::new(0, 0, 0, 32, vec![]).is_err());
        assert!(KdfParams::new(3, 1, 1, 32, vec![]).unwrap_err().is_config());
    }

    #[test]
    fn short_dklen_is_rejected() {
        let err = KdfParams::new(16, 1, 1, 16, vec![0u8; 16]).unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[test]
    fn oversized_dklen_is_rejected() {
        for dklen in [usize::MAX, 1 << 34, MAX_DKLEN + 1] {
            let err = KdfParams::new(16, 1, 1, dklen, vec![0u8; 16]).unwrap_err();
            assert!(err.is_config(), "{err}");
        }
        assert!(KdfParams::new(16, 1, 1, MAX_DKLEN, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn derive_into_matches_derive() {
        let kdf = test_params(b"salty");
        let mut scratch = Scratch::new(*kdf.scrypt());
        let mut key = [0u8; 32];
        derive_key_into(&mut scratch, "hunter2", &kdf, &mut key).unwrap();
        assert_eq!(&key[..], &derive_key("hunter2", &kdf).unwrap()[..]);
    }

    #[test]
    fn mismatched_scratch_is_rejected() {
        let kdf = test_params(b"salty");
        let mut scratch = Scratch::new(ScryptParams::new(32, 1, 1).unwrap());
        let mut key = [0u8; 32];
        assert!(derive_key_into(&mut scratch, "pw", &kdf, &mut key).is_err());
    }
}
