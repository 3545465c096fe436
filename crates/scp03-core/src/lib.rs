//! GlobalPlatform SCP03 platform key rotation.
//!
//! This crate replaces the static keyset (ENC, MAC, DEK) of a secure element
//! over an established secure channel:
//! - PUT KEY command construction, keys wrapped under the session DEK
//! - Response verification against locally computed KCVs
//! - Rotation orchestration with session DEK tracking
//! - Optional recording of the active keyset
//!
//! Host crypto and the card link are supplied through the traits in
//! `scp03-platform`; `simulator` provides a software card for tests and demos.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod persist;
pub mod rotation;
pub mod session;
pub mod simulator;
pub mod verify;

pub use command::{build, ExpectedKcvs, RotationCommand, RotationCommandBuilder};
pub use config::RotationConfig;
pub use engine::{KeyCryptoEngine, ProviderEngine, WrappedKey};
pub use error::{Error, Result};
pub use fragment::EncodedKeyFragment;
pub use persist::{FileKeysetSink, PersistenceSink, WriteMode};
pub use rotation::{CycleReport, KeyRotator, PersistenceStatus, RotationReport};
pub use session::SessionContext;
pub use verify::verify;
