//! Mock implementations for testing.
//!
//! Provides deterministic, reproducible behavior for automated CI testing.

use crate::apdu::CommandHeader;
use crate::error::{Error, Result};
use crate::traits::{CardTransport, CryptoProvider, KeyHandle, KeyId};
use scp03_crypto::block::aes128_ecb_encrypt;
use scp03_crypto::{AES128_KEY_LEN, AES_BLOCK_LEN};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

/// Type alias for a scripted transport responder.
type Responder = Box<dyn FnMut(&CommandHeader, &[u8]) -> Result<Vec<u8>> + Send>;

/// Provider operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOp {
    /// `allocate_transient_key`
    Allocate,
    /// `install_key`
    Install,
    /// `aes_ecb_encrypt`
    Encrypt,
    /// `fetch_key_material`
    Fetch,
    /// `release_key`
    Release,
}

/// In-memory software crypto provider.
///
/// Key objects live in a map keyed by [`KeyId`]; AES comes from
/// `scp03_crypto::block`. A fault can be injected per operation to exercise
/// provider failure paths.
///
/// # Example
///
/// ```
/// use scp03_platform::mock::SoftwareCryptoProvider;
/// use scp03_platform::traits::{CryptoProvider, KeyId};
///
/// let mut provider = SoftwareCryptoProvider::new();
/// let dek = provider.provision(KeyId(1), &[0x11; 16]).unwrap();
/// let material = provider.fetch_key_material(dek).unwrap();
/// assert_eq!(&material[..], &[0x11; 16]);
/// ```
#[derive(Default)]
pub struct SoftwareCryptoProvider {
    slots: HashMap<KeyId, Option<Zeroizing<[u8; AES128_KEY_LEN]>>>,
    fault: Option<ProviderOp>,
}

impl SoftwareCryptoProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        tracing::warn!("Using SoftwareCryptoProvider - key material held in process memory");
        Self::default()
    }

    /// Allocates `id` and installs `key` in one step.
    ///
    /// Used to stand up the session DEK before a rotation.
    pub fn provision(&mut self, id: KeyId, key: &[u8]) -> Result<KeyHandle> {
        let handle = self.allocate_transient_key(id)?;
        self.install_key(handle, key)?;
        Ok(handle)
    }

    /// Makes every subsequent call of `op` fail with `Error::Keystore`.
    ///
    /// `None` clears the fault.
    pub fn inject_fault(&mut self, op: Option<ProviderOp>) {
        self.fault = op;
    }

    /// Number of currently allocated key objects.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    fn check_fault(&self, op: ProviderOp) -> Result<()> {
        if self.fault == Some(op) {
            return Err(Error::Keystore(format!("Injected {:?} failure", op)));
        }
        Ok(())
    }

    fn material(&self, handle: KeyHandle) -> Result<&[u8; AES128_KEY_LEN]> {
        match self.slots.get(&handle.id()) {
            Some(Some(key)) => Ok(&**key),
            Some(None) => Err(Error::EmptyKey(handle.id())),
            None => Err(Error::UnknownKey(handle.id())),
        }
    }
}

impl CryptoProvider for SoftwareCryptoProvider {
    fn allocate_transient_key(&mut self, id: KeyId) -> Result<KeyHandle> {
        self.check_fault(ProviderOp::Allocate)?;
        if self.slots.contains_key(&id) {
            return Err(Error::KeyInUse(id));
        }
        self.slots.insert(id, None);
        Ok(KeyHandle::new(id))
    }

    fn install_key(&mut self, handle: KeyHandle, key: &[u8]) -> Result<()> {
        self.check_fault(ProviderOp::Install)?;
        if key.len() != AES128_KEY_LEN {
            return Err(scp03_crypto::Error::InvalidKeyLength {
                expected: AES128_KEY_LEN,
                actual: key.len(),
            }
            .into());
        }
        let slot = self
            .slots
            .get_mut(&handle.id())
            .ok_or(Error::UnknownKey(handle.id()))?;

        let mut material = Zeroizing::new([0u8; AES128_KEY_LEN]);
        material.copy_from_slice(key);
        *slot = Some(material);
        Ok(())
    }

    fn aes_ecb_encrypt(
        &self,
        handle: KeyHandle,
        block: &[u8; AES_BLOCK_LEN],
    ) -> Result<[u8; AES_BLOCK_LEN]> {
        self.check_fault(ProviderOp::Encrypt)?;
        let key = self.material(handle)?;
        Ok(aes128_ecb_encrypt(key, block)?)
    }

    fn fetch_key_material(&self, handle: KeyHandle) -> Result<Zeroizing<Vec<u8>>> {
        self.check_fault(ProviderOp::Fetch)?;
        let key = self.material(handle)?;
        Ok(Zeroizing::new(key.to_vec()))
    }

    fn release_key(&mut self, handle: KeyHandle) -> Result<()> {
        self.check_fault(ProviderOp::Release)?;
        self.slots
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(Error::UnknownKey(handle.id()))
    }
}

/// One APDU captured by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentApdu {
    /// Command header.
    pub header: CommandHeader,
    /// Command data field.
    pub data: Vec<u8>,
}

/// Shared view of the APDUs a [`ScriptedTransport`] has sent.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<SentApdu>>>);

impl SentLog {
    /// Snapshot of every APDU sent so far.
    pub fn entries(&self) -> Vec<SentApdu> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of APDUs sent.
    pub fn len(&self) -> usize {
        self.0.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// True if nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, apdu: SentApdu) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(apdu);
        }
    }
}

/// Mock card transport driven by a closure.
///
/// Every exchange is recorded in a [`SentLog`] the test can keep after the
/// transport has been moved into the orchestrator.
///
/// # Example
///
/// ```
/// use scp03_platform::mock::ScriptedTransport;
/// use scp03_platform::traits::CardTransport;
/// use scp03_platform::CommandHeader;
///
/// let mut transport = ScriptedTransport::replying(vec![0x90, 0x00]);
/// let log = transport.log();
///
/// let response = transport.transceive(&CommandHeader::put_key(1), &[0xAA]).unwrap();
/// assert_eq!(response, vec![0x90, 0x00]);
/// assert_eq!(log.len(), 1);
/// ```
pub struct ScriptedTransport {
    responder: Responder,
    log: SentLog,
}

impl ScriptedTransport {
    /// Transport whose responses are computed by `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&CommandHeader, &[u8]) -> Result<Vec<u8>> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            log: SentLog::default(),
        }
    }

    /// Transport that always returns `response`.
    pub fn replying(response: Vec<u8>) -> Self {
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Transport whose link always fails.
    pub fn failing(reason: &str) -> Self {
        let reason = reason.to_string();
        Self::new(move |_, _| Err(Error::Link(reason.clone())))
    }

    /// Handle on the sent-APDU log.
    pub fn log(&self) -> SentLog {
        self.log.clone()
    }
}

impl CardTransport for ScriptedTransport {
    fn transceive(&mut self, header: &CommandHeader, data: &[u8]) -> Result<Vec<u8>> {
        self.log.push(SentApdu {
            header: *header,
            data: data.to_vec(),
        });
        (self.responder)(header, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scp03_crypto::block::aes128_ecb_decrypt;

    #[test]
    fn test_software_provider_encrypt_matches_aes() {
        let mut provider = SoftwareCryptoProvider::new();
        let key = [0x42u8; 16];
        let handle = provider.provision(KeyId(7), &key).unwrap();

        let ct = provider.aes_ecb_encrypt(handle, &[0x01; 16]).unwrap();
        assert_eq!(aes128_ecb_decrypt(&key, &ct).unwrap(), [0x01; 16]);
    }

    #[test]
    fn test_software_provider_double_allocate() {
        let mut provider = SoftwareCryptoProvider::new();
        provider.allocate_transient_key(KeyId(1)).unwrap();
        assert_eq!(
            provider.allocate_transient_key(KeyId(1)).unwrap_err(),
            Error::KeyInUse(KeyId(1))
        );
    }

    #[test]
    fn test_software_provider_empty_key() {
        let mut provider = SoftwareCryptoProvider::new();
        let handle = provider.allocate_transient_key(KeyId(2)).unwrap();
        assert_eq!(
            provider.aes_ecb_encrypt(handle, &[0; 16]).unwrap_err(),
            Error::EmptyKey(KeyId(2))
        );
    }

    #[test]
    fn test_software_provider_release() {
        let mut provider = SoftwareCryptoProvider::new();
        let handle = provider.provision(KeyId(3), &[0u8; 16]).unwrap();
        assert_eq!(provider.allocated(), 1);

        provider.release_key(handle).unwrap();
        assert_eq!(provider.allocated(), 0);
        assert_eq!(
            provider.fetch_key_material(handle).unwrap_err(),
            Error::UnknownKey(KeyId(3))
        );
    }

    #[test]
    fn test_software_provider_rejects_short_key() {
        let mut provider = SoftwareCryptoProvider::new();
        let handle = provider.allocate_transient_key(KeyId(4)).unwrap();
        assert!(matches!(
            provider.install_key(handle, &[0u8; 8]).unwrap_err(),
            Error::Crypto(scp03_crypto::Error::InvalidKeyLength { actual: 8, .. })
        ));
    }

    #[test]
    fn test_software_provider_fault_injection() {
        let mut provider = SoftwareCryptoProvider::new();
        let handle = provider.provision(KeyId(5), &[0u8; 16]).unwrap();

        provider.inject_fault(Some(ProviderOp::Encrypt));
        assert!(matches!(
            provider.aes_ecb_encrypt(handle, &[0; 16]).unwrap_err(),
            Error::Keystore(_)
        ));

        provider.inject_fault(None);
        assert!(provider.aes_ecb_encrypt(handle, &[0; 16]).is_ok());
    }

    #[test]
    fn test_scripted_transport_records_exchange() {
        let mut transport = ScriptedTransport::new(|header, data| {
            let mut response = vec![header.p1, data.len() as u8];
            response.extend_from_slice(&[0x90, 0x00]);
            Ok(response)
        });
        let log = transport.log();

        let response = transport
            .transceive(&CommandHeader::put_key(0x0B), &[1, 2, 3])
            .unwrap();

        assert_eq!(response, vec![0x0B, 3, 0x90, 0x00]);
        assert_eq!(
            log.entries(),
            vec![SentApdu {
                header: CommandHeader::put_key(0x0B),
                data: vec![1, 2, 3],
            }]
        );
    }

    #[test]
    fn test_failing_transport() {
        let mut transport = ScriptedTransport::failing("reader removed");
        let log = transport.log();

        let err = transport
            .transceive(&CommandHeader::put_key(1), &[0])
            .unwrap_err();
        assert_eq!(err, Error::Link("reader removed".into()));
        assert_eq!(log.len(), 1);
    }
}
