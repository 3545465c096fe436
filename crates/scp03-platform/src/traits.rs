//! Abstraction traits for the host crypto provider and the card transport.
//!
//! These traits let the rotation core run against hardware keystores and
//! real readers while staying testable through mocks.

use crate::apdu::CommandHeader;
use crate::error::Result;
use core::fmt;
use scp03_crypto::AES_BLOCK_LEN;
use zeroize::Zeroizing;

/// Caller-chosen identifier for a transient key object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u32);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Handle to a key object allocated by a [`CryptoProvider`].
///
/// Handles are only meaningful to the provider that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHandle {
    id: KeyId,
}

impl KeyHandle {
    /// Build a handle for a key object id.
    ///
    /// Providers call this when allocating; callers normally receive handles
    /// rather than build them.
    pub fn new(id: KeyId) -> Self {
        Self { id }
    }

    /// Id of the key object behind this handle.
    pub fn id(&self) -> KeyId {
        self.id
    }
}

/// Host-side symmetric crypto provider.
///
/// Platform-specific implementations:
/// - Hardware keystore / HSM (out of tree)
/// - Testing: in-memory software provider (SoftwareCryptoProvider)
///
/// # Concurrency
///
/// Key objects are mutable shared state. A provider must not be used by two
/// rotations at once; `&mut self` on the mutating calls enforces that for a
/// single owner.
pub trait CryptoProvider: Send {
    /// Allocates an empty transient AES-128 key object.
    ///
    /// # Errors
    ///
    /// - `Error::KeyInUse` if `id` is already allocated
    /// - `Error::Keystore` if the provider is out of key slots
    fn allocate_transient_key(&mut self, id: KeyId) -> Result<KeyHandle>;

    /// Installs (or replaces) the key material of an allocated key object.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownKey` if the handle is not allocated
    /// - `Error::Crypto` if the material is not a valid AES-128 key
    fn install_key(&mut self, handle: KeyHandle, key: &[u8]) -> Result<()>;

    /// Encrypts exactly one block with AES-ECB under the key object.
    fn aes_ecb_encrypt(
        &self,
        handle: KeyHandle,
        block: &[u8; AES_BLOCK_LEN],
    ) -> Result<[u8; AES_BLOCK_LEN]>;

    /// Reads back the raw material of a key object.
    ///
    /// Used to re-install the session DEK into a scratch object.
    fn fetch_key_material(&self, handle: KeyHandle) -> Result<Zeroizing<Vec<u8>>>;

    /// Frees a key object. Its material is wiped.
    fn release_key(&mut self, handle: KeyHandle) -> Result<()>;
}

/// Synchronous APDU exchange with a secure element.
///
/// Implementations cover I2C, SPI or PC/SC links. The rotation core keeps a
/// single request in flight and never interleaves other exchanges.
pub trait CardTransport: Send {
    /// Sends `header || Lc || data || Le` and returns the raw response,
    /// including the trailing two status word bytes.
    ///
    /// # Errors
    ///
    /// - `Error::Link` if the exchange itself failed (no response at all)
    fn transceive(&mut self, header: &CommandHeader, data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transceive(&mut self, header: &CommandHeader, data: &[u8]) -> Result<Vec<u8>> {
        (**self).transceive(header, data)
    }
}

impl<T: CryptoProvider + ?Sized> CryptoProvider for Box<T> {
    fn allocate_transient_key(&mut self, id: KeyId) -> Result<KeyHandle> {
        (**self).allocate_transient_key(id)
    }

    fn install_key(&mut self, handle: KeyHandle, key: &[u8]) -> Result<()> {
        (**self).install_key(handle, key)
    }

    fn aes_ecb_encrypt(
        &self,
        handle: KeyHandle,
        block: &[u8; AES_BLOCK_LEN],
    ) -> Result<[u8; AES_BLOCK_LEN]> {
        (**self).aes_ecb_encrypt(handle, block)
    }

    fn fetch_key_material(&self, handle: KeyHandle) -> Result<Zeroizing<Vec<u8>>> {
        (**self).fetch_key_material(handle)
    }

    fn release_key(&mut self, handle: KeyHandle) -> Result<()> {
        (**self).release_key(handle)
    }
}
