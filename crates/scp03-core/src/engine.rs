//! Key wrapping under the session DEK.
//!
//! For every key of a new keyset the engine produces:
//! - the KCV: AES-ECB of `0x01 * 16` under the *new key itself*, first 3 bytes
//! - the ciphertext: AES-ECB of the new key under the *current session DEK*
//!
//! The DEK is the one active on the card before the rotation takes effect.

use crate::{Error, Result};
use scp03_crypto::block::{truncate_kcv, KCV_REFERENCE_BLOCK};
use scp03_crypto::{Kcv, StaticKey, AES_BLOCK_LEN};
use scp03_platform::traits::{CryptoProvider, KeyHandle, KeyId};

/// First key object id used for scratch keys.
///
/// Scratch ids never collide with the DEK passed to the same call, even if the
/// DEK lives inside the scratch range.
pub const SCRATCH_KEY_ID_BASE: u32 = 0x7D00_0000;

/// Number of scratch ids cycled through before wrapping.
const SCRATCH_KEY_ID_SPAN: u32 = 0x0001_0000;

/// A key encrypted under the DEK together with its check value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedKey {
    /// AES-ECB ciphertext of the key under the DEK.
    pub ciphertext: [u8; AES_BLOCK_LEN],
    /// Key Check Value of the plaintext key.
    pub kcv: Kcv,
}

/// Produces wrapped keys for a PUT KEY command.
///
/// Implementations may keep a transient key slot; callers must not interleave
/// two rotations on one engine.
pub trait KeyCryptoEngine {
    /// Wrap `plaintext` under the DEK behind `dek` and compute its KCV.
    ///
    /// # Errors
    ///
    /// `Error::Crypto` if the provider fails to allocate, install or encrypt.
    fn encrypt_and_checksum(&mut self, plaintext: &StaticKey, dek: KeyHandle) -> Result<WrappedKey>;

    /// Replace the material behind the session DEK handle.
    ///
    /// Called once the card has confirmed a new keyset so the next rotation
    /// wraps under the DEK the card now holds.
    fn install_dek(&mut self, dek: KeyHandle, key: &StaticKey) -> Result<()>;
}

impl<E: KeyCryptoEngine + ?Sized> KeyCryptoEngine for &mut E {
    fn encrypt_and_checksum(&mut self, plaintext: &StaticKey, dek: KeyHandle) -> Result<WrappedKey> {
        (**self).encrypt_and_checksum(plaintext, dek)
    }

    fn install_dek(&mut self, dek: KeyHandle, key: &StaticKey) -> Result<()> {
        (**self).install_dek(dek, key)
    }
}

/// [`KeyCryptoEngine`] backed by a [`CryptoProvider`].
///
/// Each call borrows one scratch key object: the new key is installed to
/// compute its KCV, then the DEK material is fetched and installed in the same
/// object to encrypt the new key. The scratch object is released on every
/// path, including errors.
pub struct ProviderEngine<P> {
    provider: P,
    next_scratch: u32,
}

impl<P: CryptoProvider> ProviderEngine<P> {
    /// Create an engine over `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            next_scratch: 0,
        }
    }

    /// Borrow the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutably borrow the provider.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Give the provider back.
    pub fn into_inner(self) -> P {
        self.provider
    }

    fn scratch_id(&mut self, reserved: KeyId) -> KeyId {
        loop {
            let id = KeyId(SCRATCH_KEY_ID_BASE + self.next_scratch);
            self.next_scratch = (self.next_scratch + 1) % SCRATCH_KEY_ID_SPAN;
            if id != reserved {
                return id;
            }
        }
    }

    fn wrap_in(
        &mut self,
        scratch: KeyHandle,
        plaintext: &StaticKey,
        dek: KeyHandle,
    ) -> scp03_platform::Result<WrappedKey> {
        self.provider.install_key(scratch, plaintext.as_bytes())?;
        let check = self.provider.aes_ecb_encrypt(scratch, &KCV_REFERENCE_BLOCK)?;
        let kcv = truncate_kcv(&check);

        let dek_material = self.provider.fetch_key_material(dek)?;
        self.provider.install_key(scratch, &dek_material)?;
        let ciphertext = self.provider.aes_ecb_encrypt(scratch, plaintext.as_bytes())?;

        Ok(WrappedKey { ciphertext, kcv })
    }
}

impl<P: CryptoProvider> KeyCryptoEngine for ProviderEngine<P> {
    fn encrypt_and_checksum(&mut self, plaintext: &StaticKey, dek: KeyHandle) -> Result<WrappedKey> {
        let id = self.scratch_id(dek.id());
        let scratch = self
            .provider
            .allocate_transient_key(id)
            .map_err(Error::Crypto)?;

        let wrapped = self.wrap_in(scratch, plaintext, dek);
        let released = self.provider.release_key(scratch);

        let wrapped = wrapped.map_err(Error::Crypto)?;
        released.map_err(Error::Crypto)?;
        Ok(wrapped)
    }

    fn install_dek(&mut self, dek: KeyHandle, key: &StaticKey) -> Result<()> {
        self.provider
            .install_key(dek, key.as_bytes())
            .map_err(Error::Crypto)
    }
}
