//! Rotate-and-revert demo against a simulated secure element.
//!
//! Reads configuration from environment variables (see `scp03_core::config`),
//! installs a new keyset on the simulated card and then restores the original
//! one. Keysets default to the GlobalPlatform test keys (`40..4F`) for the
//! original and random keys for the new set; override them with
//! `SCP03_OLD_{ENC,MAC,DEK}` and `SCP03_NEW_{ENC,MAC,DEK}`.

use scp03_core::config::{keyset_from_env, RotationConfig};
use scp03_core::simulator::SimulatedSecureElement;
use scp03_core::{KeyRotator, PersistenceStatus, ProviderEngine, RotationReport, SessionContext};
use scp03_crypto::{KeyRole, StaticKey, StaticKeyset};
use scp03_platform::mock::SoftwareCryptoProvider;
use scp03_platform::KeyId;
use tracing_subscriber::EnvFilter;

/// Key object id of the session DEK in the software provider.
const SESSION_DEK_ID: KeyId = KeyId(0x0000_0001);

fn default_original_keyset() -> StaticKeyset {
    let mut key = [0u8; 16];
    for (i, b) in key.iter_mut().enumerate() {
        *b = 0x40 + i as u8;
    }
    StaticKeyset::uniform(StaticKey::new(key))
}

fn print_report(label: &str, report: &RotationReport) {
    println!("{} (key version 0x{:02X}):", label, report.key_version);
    for role in KeyRole::ALL {
        println!("   KCV {}: {}", role, hex::encode(report.kcv(role)));
    }
    match &report.persistence {
        PersistenceStatus::Disabled => {}
        PersistenceStatus::Recorded => println!("   keyset recorded"),
        PersistenceStatus::Failed(e) => println!("   keyset NOT recorded: {}", e),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RotationConfig::from_env()?;
    let original = keyset_from_env("SCP03_OLD")?.unwrap_or_else(default_original_keyset);
    let new = keyset_from_env("SCP03_NEW")?.unwrap_or_else(StaticKeyset::generate);

    let card = SimulatedSecureElement::new(original.clone(), config.key_version);

    let mut provider = SoftwareCryptoProvider::new();
    let dek = provider.provision(SESSION_DEK_ID, original.dek.as_bytes())?;
    let mut session = SessionContext::new(dek, config.key_version);

    let mut rotator = KeyRotator::new(ProviderEngine::new(provider), card);
    rotator.set_sink(config.build_sink());

    let cycle = rotator
        .rotate_and_revert(&mut session, config.key_version, &new, &original)
        .map_err(|e| {
            if e.is_indeterminate() {
                eprintln!("Card key state is indeterminate, manual recovery required");
            }
            e
        })?;

    print_report("Rotated to new keyset", &cycle.forward);
    print_report("Reverted to original keyset", &cycle.revert);
    println!(
        "Card holds original keyset: {}",
        rotator.transport().keyset() == &original
    );
    Ok(())
}
