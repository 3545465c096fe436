//! PUT KEY command assembly.
//!
//! Command body (70 bytes): `new_key_version(1) || ENC fragment || MAC fragment || DEK fragment`.
//! The header carries the key version being replaced in P1.
//!
//! Alongside the body the builder produces the response the card is expected
//! to return on success: `new_key_version || kcv_enc || kcv_mac || kcv_dek`.

use crate::engine::KeyCryptoEngine;
use crate::fragment::{self, EncodedKeyFragment, FRAGMENT_LEN};
use crate::{Error, Result};
use core::fmt;
use scp03_crypto::{KeyRole, StaticKeyset, KCV_LEN};
use scp03_platform::{CommandHeader, KeyHandle};

/// Number of keys in a keyset.
pub const KEYS_PER_SET: usize = 3;

/// Length of the PUT KEY command body.
pub const COMMAND_BODY_LEN: usize = 1 + KEYS_PER_SET * FRAGMENT_LEN;

/// Length of the expected response data (without status word).
pub const EXPECTED_KCVS_LEN: usize = 1 + KEYS_PER_SET * KCV_LEN;

/// Response data the card must return for a successful rotation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ExpectedKcvs([u8; EXPECTED_KCVS_LEN]);

impl ExpectedKcvs {
    /// Wrap raw expected-response bytes.
    pub const fn from_bytes(bytes: [u8; EXPECTED_KCVS_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; EXPECTED_KCVS_LEN] {
        &self.0
    }

    /// New key version the card must echo.
    pub fn key_version(&self) -> u8 {
        self.0[0]
    }

    /// KCV expected for `role`.
    pub fn kcv(&self, role: KeyRole) -> [u8; KCV_LEN] {
        let start = 1 + role.index() * KCV_LEN;
        let mut kcv = [0u8; KCV_LEN];
        kcv.copy_from_slice(&self.0[start..start + KCV_LEN]);
        kcv
    }
}

impl fmt::Debug for ExpectedKcvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpectedKcvs({})", hex::encode(self.0))
    }
}

/// A complete PUT KEY command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationCommand {
    replaced_version: u8,
    new_version: u8,
    fragments: [EncodedKeyFragment; KEYS_PER_SET],
}

impl RotationCommand {
    /// Key version replaced on the card (header P1).
    pub fn replaced_version(&self) -> u8 {
        self.replaced_version
    }

    /// Key version installed by this command (first body byte).
    pub fn new_version(&self) -> u8 {
        self.new_version
    }

    /// Fragment for `role`.
    pub fn fragment(&self, role: KeyRole) -> &EncodedKeyFragment {
        &self.fragments[role.index()]
    }

    /// Fragments in wire order.
    pub fn fragments(&self) -> &[EncodedKeyFragment; KEYS_PER_SET] {
        &self.fragments
    }

    /// `80 D8 <replaced_version> 81`.
    pub fn header(&self) -> CommandHeader {
        CommandHeader::put_key(self.replaced_version)
    }

    /// Command data field.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(COMMAND_BODY_LEN);
        body.push(self.new_version);
        for fragment in &self.fragments {
            fragment.write_to(&mut body);
        }
        body
    }

    /// Response a card must return after applying this command.
    pub fn expected_kcvs(&self) -> ExpectedKcvs {
        let mut buf = [0u8; EXPECTED_KCVS_LEN];
        buf[0] = self.new_version;
        for (i, fragment) in self.fragments.iter().enumerate() {
            buf[1 + i * KCV_LEN..1 + (i + 1) * KCV_LEN].copy_from_slice(&fragment.kcv);
        }
        ExpectedKcvs(buf)
    }

    /// Decode a command from its header and data field.
    ///
    /// Card-side counterpart of [`build`]; used by the simulator and by
    /// echo transports in tests.
    ///
    /// # Errors
    ///
    /// `Error::MalformedCommand` if the header is not a multi-key PUT KEY,
    /// the body is not exactly 70 bytes, or a fragment does not decode.
    pub fn parse(header: &CommandHeader, body: &[u8]) -> Result<Self> {
        let expected = CommandHeader::put_key(header.p1);
        if *header != expected {
            return Err(Error::MalformedCommand(format!(
                "Not a multi-key PUT KEY header: {}",
                hex::encode(header.to_bytes())
            )));
        }
        if body.len() != COMMAND_BODY_LEN {
            return Err(Error::MalformedCommand(format!(
                "Body is {} bytes, expected {}",
                body.len(),
                COMMAND_BODY_LEN
            )));
        }

        let new_version = body[0];
        let (enc, rest) = EncodedKeyFragment::parse(&body[1..])?;
        let (mac, rest) = EncodedKeyFragment::parse(rest)?;
        let (dek, _) = EncodedKeyFragment::parse(rest)?;

        Ok(Self {
            replaced_version: header.p1,
            new_version,
            fragments: [enc, mac, dek],
        })
    }
}

/// Appends fragments in ENC, MAC, DEK order.
///
/// The typed `push` rejects out-of-order roles so a command can never carry
/// keys in the wrong slots.
#[derive(Debug)]
pub struct RotationCommandBuilder {
    replaced_version: u8,
    new_version: u8,
    fragments: Vec<EncodedKeyFragment>,
}

impl RotationCommandBuilder {
    /// Start a command that replaces `replaced_version` with `new_version`.
    pub fn new(replaced_version: u8, new_version: u8) -> Self {
        Self {
            replaced_version,
            new_version,
            fragments: Vec::with_capacity(KEYS_PER_SET),
        }
    }

    /// Append the fragment for `role`.
    ///
    /// # Errors
    ///
    /// `Error::MalformedCommand` if `role` is not the next one in wire order.
    pub fn push(&mut self, role: KeyRole, fragment: EncodedKeyFragment) -> Result<&mut Self> {
        let next = KeyRole::ALL.get(self.fragments.len()).copied();
        if next != Some(role) {
            return Err(Error::MalformedCommand(format!(
                "Fragment {} out of order, expected {:?}",
                role, next
            )));
        }
        self.fragments.push(fragment);
        Ok(self)
    }

    /// Finish the command.
    ///
    /// # Errors
    ///
    /// `Error::MalformedCommand` unless all three fragments were pushed.
    pub fn finish(self) -> Result<RotationCommand> {
        let count = self.fragments.len();
        let fragments: [EncodedKeyFragment; KEYS_PER_SET] = self
            .fragments
            .try_into()
            .map_err(|_| Error::MalformedCommand(format!("{} of 3 fragments present", count)))?;
        Ok(RotationCommand {
            replaced_version: self.replaced_version,
            new_version: self.new_version,
            fragments,
        })
    }
}

/// Build the PUT KEY command installing `keyset` as key version `key_version`.
///
/// The keyset is replaced in place: P1 and the first body byte both carry
/// `key_version`. Use [`RotationCommandBuilder`] to install under a version
/// other than the one replaced. Each key is wrapped under the session DEK
/// behind `dek`.
///
/// # Errors
///
/// `Error::Crypto` if any key fails to wrap. No partial command is returned.
///
/// # Example
///
/// ```
/// use scp03_core::command::build;
/// use scp03_core::engine::ProviderEngine;
/// use scp03_crypto::{StaticKey, StaticKeyset};
/// use scp03_platform::mock::SoftwareCryptoProvider;
/// use scp03_platform::KeyId;
///
/// let mut provider = SoftwareCryptoProvider::new();
/// let dek = provider.provision(KeyId(1), &[0x40; 16]).unwrap();
/// let mut engine = ProviderEngine::new(provider);
///
/// let keyset = StaticKeyset::uniform(StaticKey::new([0x11; 16]));
/// let (command, expected) = build(&mut engine, 0x0B, &keyset, dek).unwrap();
///
/// assert_eq!(command.to_bytes().len(), 70);
/// assert_eq!(expected.as_bytes().len(), 10);
/// assert_eq!(expected.key_version(), 0x0B);
/// ```
pub fn build<E: KeyCryptoEngine + ?Sized>(
    engine: &mut E,
    key_version: u8,
    keyset: &StaticKeyset,
    dek: KeyHandle,
) -> Result<(RotationCommand, ExpectedKcvs)> {
    let mut builder = RotationCommandBuilder::new(key_version, key_version);
    for (role, key) in keyset.iter() {
        let fragment = fragment::encode(engine, key, dek)?;
        builder.push(role, fragment)?;
    }
    let command = builder.finish()?;
    let expected = command.expected_kcvs();
    tracing::debug!(
        key_version,
        expected = %hex::encode(expected.as_bytes()),
        "PUT KEY command built"
    );
    Ok((command, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WrappedKey;
    use scp03_crypto::{StaticKey, AES128_KEY_LEN};
    use scp03_platform::KeyId;

    /// Deterministic engine: ciphertext = key XOR 0xFF, KCV = first 3 ciphertext bytes.
    struct XorEngine;

    impl KeyCryptoEngine for XorEngine {
        fn encrypt_and_checksum(&mut self, plaintext: &StaticKey, _dek: KeyHandle) -> Result<WrappedKey> {
            let mut ciphertext = [0u8; AES128_KEY_LEN];
            for (c, p) in ciphertext.iter_mut().zip(plaintext.as_bytes()) {
                *c = p ^ 0xFF;
            }
            let mut kcv = [0u8; KCV_LEN];
            kcv.copy_from_slice(&ciphertext[..KCV_LEN]);
            Ok(WrappedKey { ciphertext, kcv })
        }

        fn install_dek(&mut self, _dek: KeyHandle, _key: &StaticKey) -> Result<()> {
            Ok(())
        }
    }

    fn ramp_keyset() -> StaticKeyset {
        let mut key = [0u8; 16];
        for (i, b) in key.iter_mut().enumerate() {
            *b = 0x40 + i as u8;
        }
        StaticKeyset::uniform(StaticKey::new(key))
    }

    fn dek() -> KeyHandle {
        KeyHandle::new(KeyId(1))
    }

    #[test]
    fn test_build_layout() {
        let (command, expected) = build(&mut XorEngine, 0x01, &ramp_keyset(), dek()).unwrap();
        let body = command.to_bytes();

        assert_eq!(body.len(), COMMAND_BODY_LEN);
        assert_eq!(body[0], 0x01);
        assert_eq!(command.header().to_bytes(), [0x80, 0xD8, 0x01, 0x81]);

        let fragment: Vec<u8> = [0x88, 0x11, 0x10]
            .into_iter()
            .chain((0x40u8..0x50).map(|b| b ^ 0xFF))
            .chain([0x03, 0xBF, 0xBE, 0xBD])
            .collect();
        for i in 0..KEYS_PER_SET {
            let start = 1 + i * FRAGMENT_LEN;
            assert_eq!(&body[start..start + FRAGMENT_LEN], &fragment[..], "fragment {}", i);
        }

        assert_eq!(
            expected.as_bytes(),
            &[0x01, 0xBF, 0xBE, 0xBD, 0xBF, 0xBE, 0xBD, 0xBF, 0xBE, 0xBD]
        );
    }

    #[test]
    fn test_expected_kcvs_by_role() {
        let keyset = StaticKeyset::new(
            StaticKey::new([0x01; 16]),
            StaticKey::new([0x02; 16]),
            StaticKey::new([0x03; 16]),
        );
        let (_, expected) = build(&mut XorEngine, 0x20, &keyset, dek()).unwrap();

        assert_eq!(expected.key_version(), 0x20);
        assert_eq!(expected.kcv(KeyRole::Enc), [0xFE; 3]);
        assert_eq!(expected.kcv(KeyRole::Mac), [0xFD; 3]);
        assert_eq!(expected.kcv(KeyRole::Dek), [0xFC; 3]);
    }

    #[test]
    fn test_parse_inverts_build() {
        let (command, _) = build(&mut XorEngine, 0x30, &ramp_keyset(), dek()).unwrap();
        let parsed = RotationCommand::parse(&command.header(), &command.to_bytes()).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn test_parse_rejects_wrong_header_and_length() {
        let (command, _) = build(&mut XorEngine, 0x30, &ramp_keyset(), dek()).unwrap();
        let body = command.to_bytes();

        let mut header = command.header();
        header.p2 = 0x01;
        assert!(RotationCommand::parse(&header, &body).is_err());

        header = command.header();
        header.ins = 0xCA;
        assert!(RotationCommand::parse(&header, &body).is_err());

        assert!(RotationCommand::parse(&command.header(), &body[..69]).is_err());
    }

    #[test]
    fn test_builder_enforces_order() {
        let fragment = EncodedKeyFragment {
            key_type: 0x88,
            ciphertext: [0; 16],
            kcv: [0; 3],
        };
        let mut builder = RotationCommandBuilder::new(1, 1);
        assert!(builder.push(KeyRole::Mac, fragment).is_err());
        builder.push(KeyRole::Enc, fragment).unwrap();
        assert!(builder.push(KeyRole::Enc, fragment).is_err());
        builder.push(KeyRole::Mac, fragment).unwrap();

        assert!(matches!(
            RotationCommandBuilder::new(1, 1).finish().unwrap_err(),
            Error::MalformedCommand(_)
        ));
    }
}
