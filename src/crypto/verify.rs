//! Password verification against the keystore MAC.
//!
//! A candidate is correct iff `keccak256(dk[16..32] || ciphertext)` equals the
//! stored MAC, where `dk` is the scrypt-derived key. Nothing is decrypted.

use zeroize::Zeroizing;

use super::kdf::{self, KdfParams};
use super::keccak::{KECCAK_DOMAIN, Keccak1600, KeccakBits};
use super::scrypt::Scratch;
use super::{MAC_KEY_END, MAC_KEY_START, MAC_LEN};
use crate::error::RecoveryResult;

/// Ciphertext and MAC taken from the keystore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherRecord {
    ciphertext: Vec<u8>,
    mac: Vec<u8>,
}

impl CipherRecord {
    pub fn new(ciphertext: Vec<u8>, mac: Vec<u8>) -> Self {
        Self { ciphertext, mac }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn mac(&self) -> &[u8] {
        &self.mac
    }
}

/// MAC over the MAC-key half of `derived_key` followed by `ciphertext`.
///
/// # Panics
///
/// Panics if `derived_key` is shorter than [`MAC_KEY_END`] bytes.
pub fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> [u8; MAC_LEN] {
    let mut sponge = Keccak1600::new(KeccakBits::K256, KECCAK_DOMAIN);
    sponge.update(&derived_key[MAC_KEY_START..MAC_KEY_END]);
    sponge.update(ciphertext);
    let mut digest = [0u8; MAC_LEN];
    sponge.finalize().squeeze(&mut digest);
    digest
}

/// MAC a keystore protected by `password` would carry for `ciphertext`.
pub fn expected_mac(
    password: &str,
    kdf: &KdfParams,
    ciphertext: &[u8],
) -> RecoveryResult<[u8; MAC_LEN]> {
    let key = kdf::derive_key(password, kdf)?;
    Ok(compute_mac(&key, ciphertext))
}

/// Checks one candidate with freshly allocated working memory.
pub fn verify(candidate: &str, kdf: &KdfParams, record: &CipherRecord) -> RecoveryResult<bool> {
    let verifier = Verifier::new(kdf, record);
    let mut workspace = verifier.workspace();
    verifier.verify_with(&mut workspace, candidate)
}

/// Per-worker buffers: scrypt scratch plus the derived key.
pub struct Workspace {
    scratch: Scratch,
    key: Zeroizing<Vec<u8>>,
}

/// Binds the shared, read-only run inputs for repeated verification.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    kdf: &'a KdfParams,
    record: &'a CipherRecord,
}

impl<'a> Verifier<'a> {
    pub fn new(kdf: &'a KdfParams, record: &'a CipherRecord) -> Self {
        Self { kdf, record }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace {
            scratch: Scratch::new(*self.kdf.scrypt()),
            key: Zeroizing::new(vec![0u8; self.kdf.dklen()]),
        }
    }

    pub fn verify_with(&self, workspace: &mut Workspace, candidate: &str) -> RecoveryResult<bool> {
        kdf::derive_key_into(&mut workspace.scratch, candidate, self.kdf, &mut workspace.key)?;
        let digest = compute_mac(&workspace.key, self.record.ciphertext());
        let mac = self.record.mac();
        Ok(mac.len() == digest.len() && mac == digest.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(password: &str) -> (KdfParams, CipherRecord) {
        let kdf = KdfParams::new(16, 1, 1, 32, b"fixture-salt".to_vec()).unwrap();
        let ciphertext = b"\x13\x37ciphertext bytes".to_vec();
        let mac = expected_mac(password, &kdf, &ciphertext).unwrap();
        (kdf, CipherRecord::new(ciphertext, mac.to_vec()))
    }

    #[test]
    fn correct_password_verifies() {
        let (kdf, record) = fixture("open sesame");
        assert!(verify("open sesame", &kdf, &record).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let (kdf, record) = fixture("open sesame");
        assert!(!verify("open sesame!", &kdf, &record).unwrap());
        assert!(!verify("", &kdf, &record).unwrap());
    }

    #[test]
    fn truncated_mac_never_matches() {
        let (kdf, record) = fixture("pw");
        let short = CipherRecord::new(record.ciphertext().to_vec(), record.mac()[..16].to_vec());
        assert!(!verify("pw", &kdf, &short).unwrap());
    }

    #[test]
    fn mac_uses_second_key_half_only() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[..16].fill(1);
        b[..16].fill(2);
        assert_eq!(compute_mac(&a, b"ct"), compute_mac(&b, b"ct"));

        b[16] = 9;
        assert_ne!(compute_mac(&a, b"ct"), compute_mac(&b, b"ct"));
    }

    #[test]
    fn mac_matches_one_shot_keccak_of_concatenation() {
        let key: Vec<u8> = (0u8..32).collect();
        let mut message = key[16..32].to_vec();
        message.extend_from_slice(b"some ciphertext");
        assert_eq!(
            compute_mac(&key, b"some ciphertext"),
            crate::crypto::keccak::keccak256(&message)
        );
    }

    #[test]
    fn workspace_is_reusable_across_candidates() {
        let (kdf, record) = fixture("second");
        let verifier = Verifier::new(&kdf, &record);
        let mut ws = verifier.workspace();
        let results: Vec<bool> = ["first", "second", "third", "second"]
            .iter()
            .map(|c| verifier.verify_with(&mut ws, c).unwrap())
            .collect();
        assert_eq!(results, vec![false, true, false, true]);
    }
}
