//! Platform integration errors.

use crate::traits::KeyId;
use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Platform errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Keystore error.
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// No key object is allocated under this id.
    #[error("Unknown key object: {0}")]
    UnknownKey(KeyId),

    /// A key object with this id is already allocated.
    #[error("Key object already allocated: {0}")]
    KeyInUse(KeyId),

    /// Key object is allocated but holds no key material.
    #[error("Key object {0} holds no key material")]
    EmptyKey(KeyId),

    /// Link-level failure exchanging an APDU.
    #[error("Card link error: {0}")]
    Link(String),

    /// APDU could not be encoded.
    #[error("Invalid APDU: {0}")]
    InvalidApdu(String),

    /// Block cipher failure inside the provider.
    #[error("Crypto error: {0}")]
    Crypto(#[from] scp03_crypto::Error),
}
