//! Optional recording of newly installed keysets.
//!
//! Record format, one line per role in wire order:
//!
//! ```text
//! ENC 404142434445464748494a4b4c4d4e4f
//! MAC 404142434445464748494a4b4c4d4e4f
//! DEK 404142434445464748494a4b4c4d4e4f
//! ```
//!
//! The record holds plaintext keys. Files are created owner-only on Unix.

use crate::{Error, Result};
use scp03_crypto::StaticKeyset;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Default record file name.
pub const DEFAULT_FILE_NAME: &str = "plain_scp.txt";

/// Destination for the keyset of a confirmed rotation.
///
/// Called at most once per successful rotation and never on failure.
pub trait PersistenceSink: Send {
    /// Record the keyset now active on the card.
    fn record(&mut self, keyset: &StaticKeyset) -> Result<()>;
}

/// Render the text record for `keyset`.
pub fn format_record(keyset: &StaticKeyset) -> Zeroizing<String> {
    let mut record = Zeroizing::new(String::with_capacity(3 * (4 + 32 + 1)));
    for (role, key) in keyset.iter() {
        record.push_str(role.label());
        record.push(' ');
        record.push_str(&key.to_hex());
        record.push('\n');
    }
    record
}

/// How [`FileKeysetSink`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Add each record after the previous ones.
    #[default]
    Append,
    /// Replace the file so it only holds the latest keyset.
    Truncate,
}

impl std::str::FromStr for WriteMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WriteMode::Append),
            "truncate" => Ok(WriteMode::Truncate),
            other => Err(Error::InvalidConfig(format!(
                "Unknown write mode '{}', expected append or truncate",
                other
            ))),
        }
    }
}

/// Writes key records to `<dir>/<file_name>`.
#[derive(Debug, Clone)]
pub struct FileKeysetSink {
    path: PathBuf,
    mode: WriteMode,
}

impl FileKeysetSink {
    /// Sink writing to `dir/file_name`. Nothing is touched until the first record.
    pub fn new(dir: impl AsRef<Path>, file_name: &str, mode: WriteMode) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
            mode,
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write mode.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    fn write_record(&self, record: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match self.mode {
            WriteMode::Append => options.append(true),
            WriteMode::Truncate => options.write(true).truncate(true),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(record.as_bytes())?;
        file.flush()
    }
}

impl PersistenceSink for FileKeysetSink {
    fn record(&mut self, keyset: &StaticKeyset) -> Result<()> {
        let record = format_record(keyset);
        self.write_record(&record).map_err(|source| Error::Persistence {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), mode = ?self.mode, "Keyset recorded");
        Ok(())
    }
}
