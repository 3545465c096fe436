//! Static SCP03 keys and keysets.

use crate::block::{key_check_value, Kcv};
use crate::{Error, Result};
use core::fmt;
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-128 key length in bytes.
pub const AES128_KEY_LEN: usize = 16;

/// Role of a static key within an SCP03 keyset.
///
/// The declaration order is the wire order inside a `PUT KEY` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Session encryption key derivation key.
    Enc,
    /// Session MAC key derivation key.
    Mac,
    /// Data encryption key, wraps key material in provisioning commands.
    Dek,
}

impl KeyRole {
    /// All roles in wire order.
    pub const ALL: [KeyRole; 3] = [KeyRole::Enc, KeyRole::Mac, KeyRole::Dek];

    /// Position in wire order: ENC 0, MAC 1, DEK 2.
    pub const fn index(self) -> usize {
        match self {
            KeyRole::Enc => 0,
            KeyRole::Mac => 1,
            KeyRole::Dek => 2,
        }
    }

    /// Upper-case label used in key records.
    pub fn label(self) -> &'static str {
        match self {
            KeyRole::Enc => "ENC",
            KeyRole::Mac => "MAC",
            KeyRole::Dek => "DEK",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A 16-byte AES-128 static key, zeroized on drop.
///
/// `Debug` prints the KCV instead of the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticKey(Zeroizing<[u8; AES128_KEY_LEN]>);

impl StaticKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; AES128_KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Copy a key out of a slice.
    ///
    /// # Errors
    /// `Error::InvalidKeyLength` unless the slice is exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AES128_KEY_LEN {
            return Err(Error::InvalidKeyLength {
                expected: AES128_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; AES128_KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parse a key from 32 hex characters.
    ///
    /// # Example
    /// ```
    /// use scp03_crypto::StaticKey;
    ///
    /// let key = StaticKey::from_hex("404142434445464748494a4b4c4d4e4f").unwrap();
    /// assert_eq!(key.as_bytes()[0], 0x40);
    /// ```
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(text.trim()).map_err(|e| Error::InvalidEncoding(e.to_string()))?,
        );
        Self::from_slice(&bytes)
    }

    /// Generate a random key from the operating system RNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; AES128_KEY_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AES128_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex encoding of the key.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.as_bytes()))
    }

    /// Key Check Value of this key.
    pub fn kcv(&self) -> Result<Kcv> {
        key_check_value(self.as_bytes())
    }
}

impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kcv() {
            Ok(kcv) => write!(f, "StaticKey(kcv={})", hex::encode(kcv)),
            Err(_) => f.write_str("StaticKey(..)"),
        }
    }
}

impl From<[u8; AES128_KEY_LEN]> for StaticKey {
    fn from(bytes: [u8; AES128_KEY_LEN]) -> Self {
        Self::new(bytes)
    }
}

/// A complete SCP03 static keyset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticKeyset {
    /// ENC key.
    pub enc: StaticKey,
    /// MAC key.
    pub mac: StaticKey,
    /// DEK key.
    pub dek: StaticKey,
}

impl StaticKeyset {
    /// Assemble a keyset from its three keys.
    pub fn new(enc: StaticKey, mac: StaticKey, dek: StaticKey) -> Self {
        Self { enc, mac, dek }
    }

    /// Keyset with the same key in every role.
    pub fn uniform(key: StaticKey) -> Self {
        Self {
            enc: key.clone(),
            mac: key.clone(),
            dek: key,
        }
    }

    /// Fresh random keyset.
    pub fn generate() -> Self {
        Self::new(StaticKey::generate(), StaticKey::generate(), StaticKey::generate())
    }

    /// Key for a role.
    pub fn get(&self, role: KeyRole) -> &StaticKey {
        match role {
            KeyRole::Enc => &self.enc,
            KeyRole::Mac => &self.mac,
            KeyRole::Dek => &self.dek,
        }
    }

    /// Iterate `(role, key)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyRole, &StaticKey)> + '_ {
        KeyRole::ALL.into_iter().map(move |role| (role, self.get(role)))
    }
}
