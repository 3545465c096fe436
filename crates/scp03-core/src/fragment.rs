//! Single-key fragment of a PUT KEY command.
//!
//! Wire layout (23 bytes):
//!
//! ```text
//! key_type(1) = 0x88 | data_len(1) = 17 | key_len(1) = 16 | ciphertext(16) | kcv_len(1) = 3 | kcv(3)
//! ```

use crate::engine::{KeyCryptoEngine, WrappedKey};
use crate::{Error, Result};
use scp03_crypto::{Kcv, StaticKey, AES128_KEY_LEN, KCV_LEN};
use scp03_platform::KeyHandle;

/// Key type byte for AES keys.
pub const KEY_TYPE_AES: u8 = 0x88;

/// Length of an encoded AES-128 fragment.
pub const FRAGMENT_LEN: usize = 3 + AES128_KEY_LEN + 1 + KCV_LEN;

// Offsets within a fragment
const OFF_KEY_TYPE: usize = 0;
const OFF_DATA_LEN: usize = 1;
const OFF_KEY_LEN: usize = 2;
const OFF_CIPHERTEXT: usize = 3;
const OFF_KCV_LEN: usize = OFF_CIPHERTEXT + AES128_KEY_LEN;
const OFF_KCV: usize = OFF_KCV_LEN + 1;

/// One encrypted key with its KCV, as carried inside PUT KEY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedKeyFragment {
    /// Key type; always [`KEY_TYPE_AES`] for SCP03.
    pub key_type: u8,
    /// Key encrypted under the session DEK.
    pub ciphertext: [u8; AES128_KEY_LEN],
    /// KCV of the plaintext key.
    pub kcv: Kcv,
}

impl EncodedKeyFragment {
    /// AES fragment for an already wrapped key.
    pub fn aes(wrapped: WrappedKey) -> Self {
        Self {
            key_type: KEY_TYPE_AES,
            ciphertext: wrapped.ciphertext,
            kcv: wrapped.kcv,
        }
    }

    /// Length byte covering `key_len || ciphertext`.
    pub const fn data_length(&self) -> u8 {
        (1 + AES128_KEY_LEN) as u8
    }

    /// Length byte of the ciphertext.
    pub const fn key_length(&self) -> u8 {
        AES128_KEY_LEN as u8
    }

    /// Length byte of the KCV.
    pub const fn kcv_length(&self) -> u8 {
        KCV_LEN as u8
    }

    /// Append the wire form to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.key_type);
        out.push(self.data_length());
        out.push(self.key_length());
        out.extend_from_slice(&self.ciphertext);
        out.push(self.kcv_length());
        out.extend_from_slice(&self.kcv);
    }

    /// Wire form as a fixed array.
    pub fn to_bytes(&self) -> [u8; FRAGMENT_LEN] {
        let mut buf = [0u8; FRAGMENT_LEN];
        buf[OFF_KEY_TYPE] = self.key_type;
        buf[OFF_DATA_LEN] = self.data_length();
        buf[OFF_KEY_LEN] = self.key_length();
        buf[OFF_CIPHERTEXT..OFF_KCV_LEN].copy_from_slice(&self.ciphertext);
        buf[OFF_KCV_LEN] = self.kcv_length();
        buf[OFF_KCV..].copy_from_slice(&self.kcv);
        buf
    }

    /// Parse one fragment from the front of `data`, returning the rest.
    ///
    /// # Errors
    ///
    /// `Error::MalformedCommand` if the input is short or a type or length
    /// byte differs from the AES-128 layout.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < FRAGMENT_LEN {
            return Err(Error::MalformedCommand(format!(
                "Fragment needs {} bytes, got {}",
                FRAGMENT_LEN,
                data.len()
            )));
        }
        let (frag, rest) = data.split_at(FRAGMENT_LEN);

        if frag[OFF_KEY_TYPE] != KEY_TYPE_AES {
            return Err(Error::MalformedCommand(format!(
                "Unsupported key type 0x{:02X}",
                frag[OFF_KEY_TYPE]
            )));
        }
        let expected = [
            (OFF_DATA_LEN, 1 + AES128_KEY_LEN),
            (OFF_KEY_LEN, AES128_KEY_LEN),
            (OFF_KCV_LEN, KCV_LEN),
        ];
        for (offset, value) in expected {
            if frag[offset] as usize != value {
                return Err(Error::MalformedCommand(format!(
                    "Length byte at offset {} is {}, expected {}",
                    offset, frag[offset], value
                )));
            }
        }

        let mut ciphertext = [0u8; AES128_KEY_LEN];
        ciphertext.copy_from_slice(&frag[OFF_CIPHERTEXT..OFF_KCV_LEN]);
        let mut kcv = [0u8; KCV_LEN];
        kcv.copy_from_slice(&frag[OFF_KCV..]);

        Ok((
            Self {
                key_type: KEY_TYPE_AES,
                ciphertext,
                kcv,
            },
            rest,
        ))
    }
}

/// Encrypt `plaintext` under `dek` and encode it as an AES fragment.
///
/// # Errors
///
/// `Error::Crypto` from the engine. No partial fragment is produced.
pub fn encode<E: KeyCryptoEngine + ?Sized>(
    engine: &mut E,
    plaintext: &StaticKey,
    dek: KeyHandle,
) -> Result<EncodedKeyFragment> {
    let wrapped = engine.encrypt_and_checksum(plaintext, dek)?;
    Ok(EncodedKeyFragment::aes(wrapped))
}
