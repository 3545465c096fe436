//! AES-128 single-block operations and GlobalPlatform Key Check Values.
//!
//! SCP03 key material is always block-aligned, so every operation here works on
//! exactly one 16-byte block in ECB mode with no padding.
//!
//! Verified against FIPS-197 Appendix C.1.

use crate::{Error, Result};
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

/// AES block length in bytes.
pub const AES_BLOCK_LEN: usize = 16;

/// Key Check Value length in bytes.
pub const KCV_LEN: usize = 3;

/// Reference block encrypted under a key to obtain its KCV.
pub const KCV_REFERENCE_BLOCK: [u8; AES_BLOCK_LEN] = [0x01; AES_BLOCK_LEN];

/// Key Check Value: the first [`KCV_LEN`] bytes of the reference block ciphertext.
pub type Kcv = [u8; KCV_LEN];

fn cipher(key: &[u8]) -> Result<Aes128> {
    Aes128::new_from_slice(key).map_err(|_| Error::InvalidKeyLength {
        expected: 16,
        actual: key.len(),
    })
}

fn check_block(block: &[u8]) -> Result<()> {
    if block.len() != AES_BLOCK_LEN {
        return Err(Error::InvalidBlockLength {
            expected: AES_BLOCK_LEN,
            actual: block.len(),
        });
    }
    Ok(())
}

/// Encrypt one block with AES-128-ECB.
///
/// # Errors
/// - `Error::InvalidKeyLength` if `key` is not 16 bytes
/// - `Error::InvalidBlockLength` if `block` is not 16 bytes
///
/// # Example
/// ```
/// use scp03_crypto::block::aes128_ecb_encrypt;
///
/// let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
/// let pt = hex::decode("00112233445566778899aabbccddeeff").unwrap();
/// let ct = aes128_ecb_encrypt(&key, &pt).unwrap();
/// assert_eq!(hex::encode(ct), "69c4e0d86a7b0430d8cdb78070b4c55a");
/// ```
pub fn aes128_ecb_encrypt(key: &[u8], block: &[u8]) -> Result<[u8; AES_BLOCK_LEN]> {
    check_block(block)?;
    let cipher = cipher(key)?;
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);

    let mut out = [0u8; AES_BLOCK_LEN];
    out.copy_from_slice(&buf);
    Ok(out)
}

/// Decrypt one block with AES-128-ECB.
///
/// Hosts never need this to rotate keys; it exists for card-side simulation
/// and for checking wrapped keys in tests.
pub fn aes128_ecb_decrypt(key: &[u8], block: &[u8]) -> Result<[u8; AES_BLOCK_LEN]> {
    check_block(block)?;
    let cipher = cipher(key)?;
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut buf);

    let mut out = [0u8; AES_BLOCK_LEN];
    out.copy_from_slice(&buf);
    Ok(out)
}

/// Compute the GlobalPlatform Key Check Value of an AES key.
///
/// The reference block `0x01 * 16` is encrypted under the key itself and the
/// first three bytes of the result are kept.
pub fn key_check_value(key: &[u8]) -> Result<Kcv> {
    let block = aes128_ecb_encrypt(key, &KCV_REFERENCE_BLOCK)?;
    Ok(truncate_kcv(&block))
}

/// Truncate a full cipher block to a KCV.
pub fn truncate_kcv(block: &[u8; AES_BLOCK_LEN]) -> Kcv {
    let mut kcv = [0u8; KCV_LEN];
    kcv.copy_from_slice(&block[..KCV_LEN]);
    kcv
}
