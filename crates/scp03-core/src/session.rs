//! Secure channel session state used by a rotation.

use scp03_platform::KeyHandle;

/// The session DEK handle and the key version the card currently holds.
///
/// Owned by the caller and lent to one rotation at a time through `&mut`.
/// After a confirmed rotation the DEK handle holds the new DEK and the key
/// version is the one just installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    dek: KeyHandle,
    key_version: u8,
}

impl SessionContext {
    /// Session whose DEK lives behind `dek`, with the card at `key_version`.
    ///
    /// `dek` may use any key object id; `ProviderEngine` keeps its scratch
    /// keys off it.
    pub fn new(dek: KeyHandle, key_version: u8) -> Self {
        Self { dek, key_version }
    }

    /// Handle of the active DEK.
    pub fn dek(&self) -> KeyHandle {
        self.dek
    }

    /// Key version the card holds.
    pub fn key_version(&self) -> u8 {
        self.key_version
    }

    pub(crate) fn advance(&mut self, key_version: u8) {
        self.key_version = key_version;
    }
}
