//! Cryptographic primitives for GlobalPlatform SCP03 platform key rotation.
//!
//! This crate holds the pieces every other layer agrees on:
//! - AES-128-ECB single-block encryption and decryption
//! - Key Check Values (first 3 bytes of `0x01..01` encrypted under the key)
//! - The static keyset type (ENC, MAC, DEK) with zeroizing storage
//!
//! Security requirements:
//! - All plaintext key buffers use Zeroizing wrappers
//! - No logging of key material
//! - Debug output of keys is redacted

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod error;
pub mod key;

pub use block::{key_check_value, Kcv, AES_BLOCK_LEN, KCV_LEN};
pub use error::{Error, Result};
pub use key::{KeyRole, StaticKey, StaticKeyset, AES128_KEY_LEN};
