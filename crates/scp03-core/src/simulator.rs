//! Software secure element answering PUT KEY.
//!
//! The simulated card holds one SCP03 keyset and its key version. On PUT KEY
//! it decrypts every key with its current DEK, checks each KCV, installs the
//! keyset and replies `version || KCVs || 90 00`, the way a GlobalPlatform
//! card does. Used by the demo binary and the integration tests.

use crate::command::{RotationCommand, COMMAND_BODY_LEN};
use scp03_crypto::block::{aes128_ecb_decrypt, key_check_value};
use scp03_crypto::{StaticKey, StaticKeyset};
use scp03_platform::apdu::{CLA_GP, INS_PUT_KEY, P2_MULTIPLE_KEYS};
use scp03_platform::{CardTransport, CommandHeader, StatusWord};

/// Status word for failures without a precise diagnosis.
const SW_UNKNOWN: StatusWord = StatusWord::from_u16(0x6F00);

/// Misbehaviour injected into [`SimulatedSecureElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFault {
    /// Apply the command but flip bit 0 of response byte `index`.
    FlipResponseByte(usize),
    /// Ignore the command and answer with this status word only.
    Status(StatusWord),
    /// Drop the exchange: the transport reports a link error.
    Mute,
}

/// In-memory GlobalPlatform card with one SCP03 keyset.
#[derive(Debug, Clone)]
pub struct SimulatedSecureElement {
    keyset: StaticKeyset,
    key_version: u8,
    fault: Option<CardFault>,
    commands: usize,
}

impl SimulatedSecureElement {
    /// Card provisioned with `keyset` as version `key_version`.
    pub fn new(keyset: StaticKeyset, key_version: u8) -> Self {
        Self {
            keyset,
            key_version,
            fault: None,
            commands: 0,
        }
    }

    /// Keyset currently installed.
    pub fn keyset(&self) -> &StaticKeyset {
        &self.keyset
    }

    /// Key version currently installed.
    pub fn key_version(&self) -> u8 {
        self.key_version
    }

    /// Number of PUT KEY commands received.
    pub fn commands_received(&self) -> usize {
        self.commands
    }

    /// Set or clear the injected fault. Faults persist until cleared.
    pub fn set_fault(&mut self, fault: Option<CardFault>) {
        self.fault = fault;
    }

    fn put_key(&mut self, header: &CommandHeader, data: &[u8]) -> Result<Vec<u8>, StatusWord> {
        if header.cla != CLA_GP {
            return Err(StatusWord::CLA_NOT_SUPPORTED);
        }
        if header.ins != INS_PUT_KEY {
            return Err(StatusWord::INS_NOT_SUPPORTED);
        }
        if header.p2 != P2_MULTIPLE_KEYS {
            return Err(StatusWord::INCORRECT_P1P2);
        }
        if header.p1 != self.key_version {
            return Err(StatusWord::REFERENCED_DATA_NOT_FOUND);
        }
        if data.len() != COMMAND_BODY_LEN {
            return Err(StatusWord::WRONG_LENGTH);
        }
        let command = RotationCommand::parse(header, data).map_err(|_| StatusWord::WRONG_DATA)?;

        let dek = self.keyset.dek.as_bytes();
        let mut keys = Vec::with_capacity(3);
        for fragment in command.fragments() {
            let plain = aes128_ecb_decrypt(dek, &fragment.ciphertext).map_err(|_| SW_UNKNOWN)?;
            let key = StaticKey::new(plain);
            let kcv = key_check_value(key.as_bytes()).map_err(|_| SW_UNKNOWN)?;
            if kcv != fragment.kcv {
                tracing::debug!("Simulated card: KCV check failed, keyset not installed");
                return Err(StatusWord::WRONG_DATA);
            }
            keys.push(key);
        }

        let mut keys = keys.into_iter();
        if let (Some(enc), Some(mac), Some(dek)) = (keys.next(), keys.next(), keys.next()) {
            self.keyset = StaticKeyset::new(enc, mac, dek);
        }
        self.key_version = command.new_version();
        tracing::debug!(
            "Simulated card: keyset version 0x{:02X} installed",
            self.key_version
        );

        Ok(command.expected_kcvs().as_bytes().to_vec())
    }
}

impl CardTransport for SimulatedSecureElement {
    fn transceive(&mut self, header: &CommandHeader, data: &[u8]) -> scp03_platform::Result<Vec<u8>> {
        self.commands += 1;

        match &self.fault {
            Some(CardFault::Mute) => {
                return Err(scp03_platform::Error::Link("card not responding".into()));
            }
            Some(CardFault::Status(sw)) => return Ok(sw.to_bytes().to_vec()),
            _ => {}
        }

        let mut response = match self.put_key(header, data) {
            Ok(data) => data,
            Err(sw) => return Ok(sw.to_bytes().to_vec()),
        };
        if let Some(CardFault::FlipResponseByte(index)) = self.fault {
            if let Some(byte) = response.get_mut(index) {
                *byte ^= 0x01;
            }
        }
        response.extend_from_slice(&StatusWord::SUCCESS.to_bytes());
        Ok(response)
    }
}
