//! Trait contract tests for CryptoProvider and CardTransport.
//!
//! These tests verify that mock implementations satisfy the trait contracts.

use scp03_crypto::block::{aes128_ecb_decrypt, key_check_value, KCV_REFERENCE_BLOCK};
use scp03_platform::mock::{ProviderOp, ScriptedTransport, SoftwareCryptoProvider};
use scp03_platform::traits::{CardTransport, CryptoProvider, KeyId};
use scp03_platform::{CommandHeader, Error, StatusWord};

// ============================================================================
// CryptoProvider Contract Tests
// ============================================================================

#[test]
fn test_provider_allocate_install_encrypt() {
    let mut provider = SoftwareCryptoProvider::new();
    let handle = provider.allocate_transient_key(KeyId(0x10)).unwrap();
    provider.install_key(handle, &[0x33; 16]).unwrap();

    let block = provider.aes_ecb_encrypt(handle, &[0x5A; 16]).unwrap();
    assert_eq!(
        aes128_ecb_decrypt(&[0x33; 16], &block).unwrap(),
        [0x5A; 16],
        "Provider ciphertext should decrypt under the installed key"
    );
}

#[test]
fn test_provider_reference_block_gives_kcv() {
    let key = hex::decode("404142434445464748494a4b4c4d4e4f").unwrap();
    let mut provider = SoftwareCryptoProvider::new();
    let handle = provider.provision(KeyId(1), &key).unwrap();

    let block = provider.aes_ecb_encrypt(handle, &KCV_REFERENCE_BLOCK).unwrap();
    assert_eq!(&block[..3], &key_check_value(&key).unwrap()[..]);
}

#[test]
fn test_provider_reinstall_replaces_material() {
    let mut provider = SoftwareCryptoProvider::new();
    let handle = provider.provision(KeyId(1), &[0x01; 16]).unwrap();
    provider.install_key(handle, &[0x02; 16]).unwrap();

    let material = provider.fetch_key_material(handle).unwrap();
    assert_eq!(&material[..], &[0x02; 16], "Second install should win");
}

#[test]
fn test_provider_handles_are_independent() {
    let mut provider = SoftwareCryptoProvider::new();
    let a = provider.provision(KeyId(1), &[0xAA; 16]).unwrap();
    let b = provider.provision(KeyId(2), &[0xBB; 16]).unwrap();

    provider.release_key(a).unwrap();
    assert_eq!(&provider.fetch_key_material(b).unwrap()[..], &[0xBB; 16]);
    assert_eq!(
        provider.fetch_key_material(a).unwrap_err(),
        Error::UnknownKey(KeyId(1))
    );
}

#[test]
fn test_provider_id_reusable_after_release() {
    let mut provider = SoftwareCryptoProvider::new();
    let handle = provider.allocate_transient_key(KeyId(9)).unwrap();
    provider.release_key(handle).unwrap();
    assert!(provider.allocate_transient_key(KeyId(9)).is_ok());
}

#[test]
fn test_provider_every_fault_surfaces() {
    for op in [
        ProviderOp::Allocate,
        ProviderOp::Install,
        ProviderOp::Encrypt,
        ProviderOp::Fetch,
        ProviderOp::Release,
    ] {
        let mut provider = SoftwareCryptoProvider::new();
        let handle = provider.provision(KeyId(1), &[0u8; 16]).unwrap();
        provider.inject_fault(Some(op));

        let result = match op {
            ProviderOp::Allocate => provider.allocate_transient_key(KeyId(2)).map(|_| ()),
            ProviderOp::Install => provider.install_key(handle, &[1u8; 16]),
            ProviderOp::Encrypt => provider.aes_ecb_encrypt(handle, &[0; 16]).map(|_| ()),
            ProviderOp::Fetch => provider.fetch_key_material(handle).map(|_| ()),
            ProviderOp::Release => provider.release_key(handle),
        };
        assert!(
            matches!(result, Err(Error::Keystore(_))),
            "{:?} fault should surface as a keystore error",
            op
        );
    }
}

#[test]
fn test_boxed_provider_delegates() {
    let mut provider: Box<dyn CryptoProvider> = Box::new(SoftwareCryptoProvider::new());
    let handle = provider.allocate_transient_key(KeyId(3)).unwrap();
    provider.install_key(handle, &[0x77; 16]).unwrap();
    assert_eq!(&provider.fetch_key_material(handle).unwrap()[..], &[0x77; 16]);
}

// ============================================================================
// CardTransport Contract Tests
// ============================================================================

#[test]
fn test_transport_returns_status_word_trailer() {
    let mut transport = ScriptedTransport::replying(vec![0x01, 0x02, 0x90, 0x00]);
    let response = transport
        .transceive(&CommandHeader::put_key(1), &[0xFF])
        .unwrap();

    let (data, sw) = StatusWord::split_response(&response).unwrap();
    assert_eq!(data, &[0x01, 0x02]);
    assert!(sw.is_success());
}

#[test]
fn test_transport_log_survives_move() {
    let transport = ScriptedTransport::replying(vec![0x6A, 0x80]);
    let log = transport.log();

    let mut boxed: Box<dyn CardTransport> = Box::new(transport);
    boxed.transceive(&CommandHeader::put_key(2), &[1]).unwrap();
    boxed.transceive(&CommandHeader::put_key(3), &[2]).unwrap();

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].header.p1, 2);
    assert_eq!(entries[1].data, vec![2]);
}

#[test]
fn test_transport_link_failure() {
    let mut transport = ScriptedTransport::failing("i2c nack");
    assert!(matches!(
        transport.transceive(&CommandHeader::put_key(1), &[0]),
        Err(Error::Link(_))
    ));
}
