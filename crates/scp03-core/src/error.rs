//! Error types for key rotation.

use scp03_platform::StatusWord;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rotation operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Key rotation errors.
///
/// Crypto and transport errors abort a rotation before or during the single
/// APDU exchange. [`Error::is_indeterminate`] tells the caller when the card
/// may already hold the new keys.
#[derive(Debug, Error)]
pub enum Error {
    /// Key object allocation, installation or cipher operation failed.
    /// Nothing was sent to the card.
    #[error("Crypto provider error: {0}")]
    Crypto(scp03_platform::Error),

    /// The APDU exchange itself failed.
    #[error("Transport error: {0}")]
    Transport(scp03_platform::Error),

    /// Response too short to carry a status word.
    #[error("Malformed response: {len} bytes")]
    MalformedResponse {
        /// Response length in bytes.
        len: usize,
    },

    /// The card returned a non-success status word.
    #[error("Card returned status {0}")]
    TransportStatus(StatusWord),

    /// The card reported success but its KCVs differ from the ones computed
    /// locally. The card key state is indeterminate.
    #[error("KCV mismatch: expected {expected}, card returned {actual}")]
    IntegrityMismatch {
        /// Expected key version and KCVs, hex.
        expected: String,
        /// Bytes returned before the status word, hex.
        actual: String,
    },

    /// The card accepted the new keyset but the session DEK could not be
    /// re-installed on the host.
    #[error("Card rotated but session update failed: {0}")]
    SessionUpdate(Box<Error>),

    /// Writing the key record failed. Never fails a rotation.
    #[error("Persistence failed for {path:?}: {source}")]
    Persistence {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// PUT KEY command body could not be decoded.
    #[error("Malformed PUT KEY command: {0}")]
    MalformedCommand(String),

    /// Key material could not be parsed.
    #[error("Invalid key: {0}")]
    Key(#[from] scp03_crypto::Error),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True when the card may hold keys other than the ones it held before
    /// the rotation. Recovery needs an operator; never retry with the same keys.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Error::IntegrityMismatch { .. }
                | Error::MalformedResponse { .. }
                | Error::SessionUpdate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indeterminate_classification() {
        let mismatch = Error::IntegrityMismatch {
            expected: "00".into(),
            actual: "01".into(),
        };
        assert!(mismatch.is_indeterminate());
        assert!(Error::SessionUpdate(Box::new(Error::InvalidConfig("x".into()))).is_indeterminate());

        assert!(!Error::TransportStatus(StatusWord::WRONG_DATA).is_indeterminate());
        assert!(!Error::Crypto(scp03_platform::Error::Keystore("x".into())).is_indeterminate());
        assert!(Error::MalformedResponse { len: 1 }.is_indeterminate());
    }

    #[test]
    fn test_status_error_display() {
        let err = Error::TransportStatus(StatusWord::WRONG_DATA);
        assert_eq!(err.to_string(), "Card returned status 0x6A80 (wrong data)");
    }
}
