//! Rotation orchestrator: build, exchange, verify, advance, record.
//!
//! One call to [`KeyRotator::rotate`] sends exactly one PUT KEY command and
//! never retries. Failures before the exchange leave the card untouched;
//! failures after it may leave the card on the new keys (see
//! [`Error::is_indeterminate`]).

use crate::command;
use crate::engine::KeyCryptoEngine;
use crate::persist::PersistenceSink;
use crate::session::SessionContext;
use crate::verify::verify;
use crate::{Error, Result};
use scp03_crypto::{Kcv, KeyRole, StaticKeyset};
use scp03_platform::CardTransport;

/// Outcome of recording the new keyset.
#[derive(Debug)]
pub enum PersistenceStatus {
    /// No sink configured.
    Disabled,
    /// Keyset written.
    Recorded,
    /// Sink failed. The rotation itself succeeded.
    Failed(Error),
}

impl PersistenceStatus {
    /// True unless the sink failed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, PersistenceStatus::Failed(_))
    }
}

/// Result of a confirmed rotation.
#[derive(Debug)]
pub struct RotationReport {
    /// Key version now active on the card.
    pub key_version: u8,
    /// KCVs confirmed by the card, in ENC, MAC, DEK order.
    pub kcvs: [Kcv; 3],
    /// What happened to the keyset record.
    pub persistence: PersistenceStatus,
}

impl RotationReport {
    /// KCV confirmed for `role`.
    pub fn kcv(&self, role: KeyRole) -> Kcv {
        self.kcvs[role.index()]
    }
}

/// Result of [`KeyRotator::rotate_and_revert`].
#[derive(Debug)]
pub struct CycleReport {
    /// Rotation to the new keyset.
    pub forward: RotationReport,
    /// Rotation back to the original keyset.
    pub revert: RotationReport,
}

/// Drives PUT KEY rotations over one engine and one transport.
///
/// # Example
///
/// ```
/// use scp03_core::engine::ProviderEngine;
/// use scp03_core::rotation::KeyRotator;
/// use scp03_core::session::SessionContext;
/// use scp03_core::simulator::SimulatedSecureElement;
/// use scp03_crypto::{StaticKey, StaticKeyset};
/// use scp03_platform::mock::SoftwareCryptoProvider;
/// use scp03_platform::KeyId;
///
/// let original = StaticKeyset::uniform(StaticKey::new([0x40; 16]));
/// let card = SimulatedSecureElement::new(original.clone(), 0x0B);
///
/// let mut provider = SoftwareCryptoProvider::new();
/// let dek = provider.provision(KeyId(1), original.dek.as_bytes()).unwrap();
/// let mut session = SessionContext::new(dek, 0x0B);
///
/// let mut rotator = KeyRotator::new(ProviderEngine::new(provider), card);
/// let report = rotator.rotate(&mut session, 0x0B, &StaticKeyset::generate()).unwrap();
/// assert_eq!(report.key_version, 0x0B);
/// ```
pub struct KeyRotator<E, T> {
    engine: E,
    transport: T,
    sink: Option<Box<dyn PersistenceSink>>,
}

impl<E: KeyCryptoEngine, T: CardTransport> KeyRotator<E, T> {
    /// Rotator without persistence.
    pub fn new(engine: E, transport: T) -> Self {
        Self {
            engine,
            transport,
            sink: None,
        }
    }

    /// Attach a persistence sink.
    pub fn with_sink(mut self, sink: Box<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace or remove the persistence sink.
    pub fn set_sink(&mut self, sink: Option<Box<dyn PersistenceSink>>) {
        self.sink = sink;
    }

    /// Borrow the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take the engine and transport back.
    pub fn into_parts(self) -> (E, T) {
        (self.engine, self.transport)
    }

    /// Install `keyset` as key version `key_version`.
    ///
    /// `key_version` is both the version replaced (P1) and the version
    /// installed (first body byte), so the card must already hold a keyset
    /// under it. The keys are wrapped under the session DEK. On success the session DEK
    /// handle holds `keyset.dek` and the session records `key_version`.
    ///
    /// # Errors
    ///
    /// - `Error::Crypto` while building: nothing was sent
    /// - `Error::Transport` if the exchange failed
    /// - `Error::MalformedResponse`, `Error::TransportStatus`,
    ///   `Error::IntegrityMismatch` from verification
    /// - `Error::SessionUpdate` if the card confirmed but the host could not
    ///   install the new DEK
    ///
    /// A persistence failure is reported in [`RotationReport::persistence`].
    pub fn rotate(
        &mut self,
        session: &mut SessionContext,
        key_version: u8,
        keyset: &StaticKeyset,
    ) -> Result<RotationReport> {
        tracing::info!(
            "Rotating keyset: version 0x{:02X} -> 0x{:02X}",
            session.key_version(),
            key_version
        );

        let (command, expected) = command::build(&mut self.engine, key_version, keyset, session.dek())
            .map_err(|e| {
                tracing::error!("Failed to build PUT KEY command: {}", e);
                e
            })?;

        let response = self
            .transport
            .transceive(&command.header(), &command.to_bytes())
            .map_err(|e| {
                tracing::error!("PUT KEY exchange failed: {}", e);
                Error::Transport(e)
            })?;

        if let Err(e) = verify(&response, &expected) {
            if e.is_indeterminate() {
                tracing::error!("Card key state indeterminate after PUT KEY: {}", e);
            } else {
                tracing::warn!("PUT KEY rejected: {}", e);
            }
            return Err(e);
        }

        self.engine
            .install_dek(session.dek(), &keyset.dek)
            .map_err(|e| {
                tracing::error!("Card rotated but session DEK update failed: {}", e);
                Error::SessionUpdate(Box::new(e))
            })?;
        session.advance(key_version);

        let kcvs = KeyRole::ALL.map(|role| expected.kcv(role));
        tracing::info!(
            "Keyset rotated to version 0x{:02X} (KCV ENC {} MAC {} DEK {})",
            key_version,
            hex::encode(kcvs[0]),
            hex::encode(kcvs[1]),
            hex::encode(kcvs[2])
        );

        let persistence = self.persist(keyset);
        Ok(RotationReport {
            key_version,
            kcvs,
            persistence,
        })
    }

    /// Rotate to `new` and then back to `original`.
    ///
    /// Two independent rotations; the second is wrapped under the DEK
    /// installed by the first. If the first fails the second is not attempted.
    ///
    /// # Errors
    ///
    /// The first error of either rotation. A revert failure leaves the card
    /// on `new`.
    pub fn rotate_and_revert(
        &mut self,
        session: &mut SessionContext,
        key_version: u8,
        new: &StaticKeyset,
        original: &StaticKeyset,
    ) -> Result<CycleReport> {
        let forward = self.rotate(session, key_version, new)?;
        let revert = self.rotate(session, key_version, original).map_err(|e| {
            tracing::error!("Revert to original keyset failed, card holds the new keyset: {}", e);
            e
        })?;
        Ok(CycleReport { forward, revert })
    }

    fn persist(&mut self, keyset: &StaticKeyset) -> PersistenceStatus {
        let Some(sink) = self.sink.as_mut() else {
            return PersistenceStatus::Disabled;
        };
        match sink.record(keyset) {
            Ok(()) => PersistenceStatus::Recorded,
            Err(e) => {
                tracing::warn!("Keyset record not written: {}", e);
                PersistenceStatus::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProviderEngine;
    use crate::simulator::SimulatedSecureElement;
    use scp03_crypto::StaticKey;
    use scp03_platform::mock::{ProviderOp, ScriptedTransport, SoftwareCryptoProvider};
    use scp03_platform::{CryptoProvider, KeyId};
    use std::sync::{Arc, Mutex};

    struct RecordingSink(Arc<Mutex<Vec<StaticKeyset>>>);

    impl PersistenceSink for RecordingSink {
        fn record(&mut self, keyset: &StaticKeyset) -> Result<()> {
            self.0.lock().unwrap().push(keyset.clone());
            Ok(())
        }
    }

    fn setup(
        original: &StaticKeyset,
    ) -> (KeyRotator<ProviderEngine<SoftwareCryptoProvider>, SimulatedSecureElement>, SessionContext)
    {
        let mut provider = SoftwareCryptoProvider::new();
        let dek = provider.provision(KeyId(1), original.dek.as_bytes()).unwrap();
        let card = SimulatedSecureElement::new(original.clone(), 0x0B);
        (
            KeyRotator::new(ProviderEngine::new(provider), card),
            SessionContext::new(dek, 0x0B),
        )
    }

    #[test]
    fn test_rotate_advances_session_and_card() {
        let original = StaticKeyset::uniform(StaticKey::new([0x40; 16]));
        let new = StaticKeyset::generate();
        let (mut rotator, mut session) = setup(&original);

        let report = rotator.rotate(&mut session, 0x0B, &new).unwrap();

        assert_eq!(report.kcv(KeyRole::Mac), new.mac.kcv().unwrap());
        assert!(matches!(report.persistence, PersistenceStatus::Disabled));
        assert_eq!(rotator.transport().keyset(), &new);

        let material = rotator
            .engine()
            .provider()
            .fetch_key_material(session.dek())
            .unwrap();
        assert_eq!(&material[..], new.dek.as_bytes(), "Session DEK should be the new DEK");
    }

    #[test]
    fn test_sink_receives_keyset_on_success_only() {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let original = StaticKeyset::uniform(StaticKey::new([0x40; 16]));
        let new = StaticKeyset::generate();
        let (rotator, mut session) = setup(&original);
        let mut rotator = rotator.with_sink(Box::new(RecordingSink(recorded.clone())));

        let report = rotator.rotate(&mut session, 0x0B, &new).unwrap();
        assert!(matches!(report.persistence, PersistenceStatus::Recorded));

        // Wrong P1: card refuses, sink untouched
        assert!(rotator.rotate(&mut session, 0x0C, &original).is_err());
        assert_eq!(recorded.lock().unwrap().as_slice(), &[new]);
    }

    #[test]
    fn test_crypto_failure_sends_nothing() {
        let mut provider = SoftwareCryptoProvider::new();
        let dek = provider.provision(KeyId(1), &[0x40; 16]).unwrap();
        provider.inject_fault(Some(ProviderOp::Encrypt));

        let transport = ScriptedTransport::replying(vec![0x90, 0x00]);
        let log = transport.log();
        let mut rotator = KeyRotator::new(ProviderEngine::new(provider), transport);
        let mut session = SessionContext::new(dek, 0x01);

        let err = rotator
            .rotate(&mut session, 0x01, &StaticKeyset::generate())
            .unwrap_err();

        assert!(matches!(err, Error::Crypto(_)));
        assert!(log.is_empty(), "No APDU may be sent after a crypto failure");
        assert_eq!(session.key_version(), 0x01);
    }

    /// Wraps keys normally but cannot update the session DEK.
    struct StuckDekEngine(ProviderEngine<SoftwareCryptoProvider>);

    impl KeyCryptoEngine for StuckDekEngine {
        fn encrypt_and_checksum(
            &mut self,
            plaintext: &StaticKey,
            dek: scp03_platform::KeyHandle,
        ) -> Result<crate::engine::WrappedKey> {
            self.0.encrypt_and_checksum(plaintext, dek)
        }

        fn install_dek(&mut self, _dek: scp03_platform::KeyHandle, _key: &StaticKey) -> Result<()> {
            Err(Error::Crypto(scp03_platform::Error::Keystore(
                "keystore locked".into(),
            )))
        }
    }

    #[test]
    fn test_session_update_failure_is_indeterminate() {
        let original = StaticKeyset::uniform(StaticKey::new([0x40; 16]));
        let new = StaticKeyset::generate();
        let mut provider = SoftwareCryptoProvider::new();
        let dek = provider.provision(KeyId(1), original.dek.as_bytes()).unwrap();
        let mut session = SessionContext::new(dek, 0x0B);

        let card = SimulatedSecureElement::new(original, 0x0B);
        let mut rotator = KeyRotator::new(StuckDekEngine(ProviderEngine::new(provider)), card);

        let err = rotator.rotate(&mut session, 0x0B, &new).unwrap_err();

        assert!(matches!(err, Error::SessionUpdate(_)), "unexpected error: {:?}", err);
        assert!(err.is_indeterminate());
        assert_eq!(rotator.transport().keyset(), &new, "Card holds the new keyset");
    }
}
