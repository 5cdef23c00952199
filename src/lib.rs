pub mod crypto;
mod error;
mod keystore;
mod search;
mod storage;

pub use crate::crypto::{CipherRecord, KdfParams};
pub use crate::error::{RecoveryError, RecoveryResult};
pub use crate::keystore::Keystore;
pub use crate::search::{CancelToken, Outcome, SearchConfig, SearchReport};
pub use crate::storage::{Storage, split_wordlist};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{info, warn};

/// A loaded keystore, ready to test candidate passwords against.
pub struct KeyProbe {
    keystore: Keystore,
}

impl KeyProbe {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_storage(&Storage::new(path.to_path_buf()))
    }

    pub fn open_with_storage(storage: &Storage) -> Result<Self> {
        if !storage.exists() {
            bail!("keystore {} does not exist", storage.path().display());
        }

        let data = storage.load()?;
        let keystore = Keystore::parse(&data)
            .with_context(|| format!("failed to parse keystore {}", storage.path().display()))?;

        let kdf = keystore.kdf();
        info!(
            path = %storage.path().display(),
            n = kdf.n(),
            r = kdf.r(),
            p = kdf.p(),
            dklen = kdf.dklen(),
            "keystore loaded"
        );
        Ok(Self::from_keystore(keystore))
    }

    pub fn from_keystore(keystore: Keystore) -> Self {
        let mac_len = keystore.record().mac().len();
        if mac_len != crypto::MAC_LEN {
            warn!(mac_len, "stored MAC is not 32 bytes; no candidate can match");
        }
        Self { keystore }
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    /// Checks a single candidate.
    pub fn verify(&self, candidate: &str) -> Result<bool> {
        crypto::verify(candidate, self.keystore.kdf(), self.keystore.record())
            .context("failed to verify candidate")
    }

    /// Runs the parallel search over `candidates`.
    pub fn search(
        &self,
        candidates: &[String],
        config: &SearchConfig,
        cancel: &CancelToken,
    ) -> Result<SearchReport> {
        search::search(
            candidates,
            self.keystore.kdf(),
            self.keystore.record(),
            config,
            cancel,
        )
        .context("password search failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_keystore(dir: &Path, password: &str) -> std::path::PathBuf {
        let kdf = KdfParams::new(16, 1, 1, 32, vec![7u8; 16]).unwrap();
        let ciphertext = vec![0xc3u8; 32];
        let mac = crypto::expected_mac(password, &kdf, &ciphertext).unwrap();
        let json = serde_json::json!({
            "version": 3,
            "crypto": {
                "cipher": "aes-128-ctr",
                "ciphertext": hex::encode(&ciphertext),
                "kdf": "scrypt",
                "kdfparams": { "n": 16, "r": 1, "p": 1, "dklen": 32, "salt": hex::encode(kdf.salt()) },
                "mac": hex::encode(mac),
            }
        });
        let path = dir.join("keystore.json");
        fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();
        path
    }

    #[test]
    fn open_and_verify() {
        let dir = tempdir().unwrap();
        let probe = KeyProbe::open(&write_keystore(dir.path(), "hunter2")).unwrap();

        assert!(probe.verify("hunter2").unwrap());
        assert!(!probe.verify("hunter3").unwrap());
        assert_eq!(probe.keystore().kdf().n(), 16);
    }

    #[test]
    fn open_fails_if_keystore_missing() {
        let dir = tempdir().unwrap();
        let err = KeyProbe::open(&dir.path().join("nope.json")).err().unwrap();
        assert!(format!("{err:#}").contains("does not exist"));
    }

    #[test]
    fn open_reports_parse_failure_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{}").unwrap();

        let err = KeyProbe::open(&path).err().unwrap();
        let msg = format!("{err:#}");
        assert!(msg.contains("failed to parse keystore"));
        assert!(msg.contains("broken.json"));
        assert!(err.downcast_ref::<RecoveryError>().is_some());
    }

    #[test]
    fn search_recovers_password_from_wordlist_file() {
        let dir = tempdir().unwrap();
        let probe = KeyProbe::open(&write_keystore(dir.path(), "letmein")).unwrap();

        let words_path = dir.path().join("words.txt");
        fs::write(&words_path, "password\n123456\nletmein\nqwerty\n").unwrap();
        let words = Storage::new(words_path).load_wordlist().unwrap();

        let report = probe
            .search(&words, &SearchConfig::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(report.outcome, Outcome::Found("letmein".into()));
    }

    #[test]
    fn search_without_match_is_exhausted() {
        let dir = tempdir().unwrap();
        let probe = KeyProbe::open(&write_keystore(dir.path(), "letmein")).unwrap();

        let words = split_wordlist(b"a\nb\nc\n");
        let report = probe
            .search(&words, &SearchConfig::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(report.outcome, Outcome::Exhausted);
        assert_eq!(report.attempts, 3);
    }
}
