use thiserror::Error;

/// Errors raised before or during a recovery run.
///
/// Every variant is fatal: the run is aborted before any worker starts, or,
/// for worker-side failures, the whole search is cancelled.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Invalid N/r/p/dkLen combination.
    #[error("invalid KDF parameters: {0}")]
    InvalidKdfParams(String),

    /// The keystore uses a key derivation function other than scrypt.
    #[error("incompatible KDF: {0}")]
    UnsupportedKdf(String),

    /// The keystore uses a cipher other than aes-128-ctr.
    #[error("incompatible cipher: {0}")]
    UnsupportedCipher(String),

    #[error("malformed keystore record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex in field '{field}': {source}")]
    Hex {
        field: &'static str,
        source: hex::FromHexError,
    },

    #[error("malformed keystore record: {0}")]
    MalformedRecord(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl RecoveryError {
    /// Returns `true` for invalid scrypt cost parameters.
    pub fn is_config(&self) -> bool {
        matches!(self, RecoveryError::InvalidKdfParams(_))
    }

    /// Returns `true` when the keystore uses an unsupported kdf or cipher.
    pub fn is_incompatible(&self) -> bool {
        matches!(
            self,
            RecoveryError::UnsupportedKdf(_) | RecoveryError::UnsupportedCipher(_)
        )
    }

    /// Returns `true` for structural or encoding problems in the keystore.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            RecoveryError::Json(_) | RecoveryError::Hex { .. } | RecoveryError::MalformedRecord(_)
        )
    }
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;
