//! Rotation configuration.
//!
//! Environment variables:
//!
//! | Variable              | Meaning                                   | Default         |
//! |-----------------------|-------------------------------------------|-----------------|
//! | `SCP03_KEY_VERSION`   | Key version, hex (`0B`, `0x0B`)           | `0x0B`          |
//! | `SCP03_KEYS_DIR`      | Enables the file record in this directory | unset (no file) |
//! | `SCP03_KEYS_FILE`     | Record file name                          | `plain_scp.txt` |
//! | `SCP03_KEYS_MODE`     | `append` or `truncate`                    | `append`        |
//!
//! Keysets are read from `<PREFIX>_ENC`, `<PREFIX>_MAC` and `<PREFIX>_DEK`,
//! 32 hex characters each.

use crate::persist::{FileKeysetSink, PersistenceSink, WriteMode, DEFAULT_FILE_NAME};
use crate::{Error, Result};
use scp03_crypto::{KeyRole, StaticKey, StaticKeyset};
use std::path::PathBuf;

/// Default key version of a GlobalPlatform SCP03 keyset.
pub const DEFAULT_KEY_VERSION: u8 = 0x0B;

/// File record settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Directory holding the record file. Created on first write.
    pub dir: PathBuf,
    /// Record file name.
    pub file_name: String,
    /// Append or truncate.
    pub mode: WriteMode,
}

impl PersistenceConfig {
    /// Settings for `dir` with default file name and mode.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            mode: WriteMode::default(),
        }
    }
}

/// Rotation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Key version targeted by PUT KEY.
    pub key_version: u8,
    /// Keyset record; `None` disables persistence.
    pub persistence: Option<PersistenceConfig>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            key_version: DEFAULT_KEY_VERSION,
            persistence: None,
        }
    }
}

impl RotationConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` for an unparsable key version or write mode.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SCP03_KEY_VERSION") {
            config.key_version = parse_key_version(&value)?;
        }

        if let Some(dir) = lookup("SCP03_KEYS_DIR").filter(|d| !d.trim().is_empty()) {
            let mut persistence = PersistenceConfig::in_dir(dir.trim());
            if let Some(name) = lookup("SCP03_KEYS_FILE").filter(|n| !n.trim().is_empty()) {
                persistence.file_name = name.trim().to_string();
            }
            if let Some(mode) = lookup("SCP03_KEYS_MODE") {
                persistence.mode = mode.parse()?;
            }
            config.persistence = Some(persistence);
        }

        Ok(config)
    }

    /// Sink described by [`RotationConfig::persistence`], if any.
    pub fn build_sink(&self) -> Option<Box<dyn PersistenceSink>> {
        self.persistence.as_ref().map(|p| {
            Box::new(FileKeysetSink::new(&p.dir, &p.file_name, p.mode)) as Box<dyn PersistenceSink>
        })
    }
}

/// Parse a key version given as hex, with or without `0x`.
pub fn parse_key_version(value: &str) -> Result<u8> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u8::from_str_radix(digits, 16)
        .map_err(|_| Error::InvalidConfig(format!("Invalid key version '{}'", trimmed)))
}

/// Read a keyset from `<prefix>_ENC`, `<prefix>_MAC` and `<prefix>_DEK`.
///
/// Returns `Ok(None)` if none of the three is set.
///
/// # Errors
///
/// - `Error::InvalidConfig` if only some of the variables are set
/// - `Error::Key` if a value is not 32 hex characters
pub fn keyset_from_lookup<F>(prefix: &str, lookup: F) -> Result<Option<StaticKeyset>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::with_capacity(3);
    let mut missing = Vec::new();
    for role in KeyRole::ALL {
        let name = format!("{}_{}", prefix, role.label());
        match lookup(&name) {
            Some(value) => keys.push(StaticKey::from_hex(&zeroize::Zeroizing::new(value))?),
            None => missing.push(name),
        }
    }

    if keys.is_empty() {
        return Ok(None);
    }
    if !missing.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "Incomplete keyset, missing {}",
            missing.join(", ")
        )));
    }

    let mut keys = keys.into_iter();
    match (keys.next(), keys.next(), keys.next()) {
        (Some(enc), Some(mac), Some(dek)) => Ok(Some(StaticKeyset::new(enc, mac, dek))),
        _ => Err(Error::InvalidConfig(format!("Incomplete keyset {}", prefix))),
    }
}

/// [`keyset_from_lookup`] over the process environment.
pub fn keyset_from_env(prefix: &str) -> Result<Option<StaticKeyset>> {
    keyset_from_lookup(prefix, |name| std::env::var(name).ok())
}
