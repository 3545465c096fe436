//! External collaborators of the SCP03 key rotation core.
//!
//! Implements:
//! - Crypto provider seam: transient AES key slots with ECB encryption
//! - Card transport seam: one APDU in, raw response (data || SW1 SW2) out
//! - GlobalPlatform command header and status word types
//! - Software mocks for both seams (deterministic, for tests and demos)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod apdu;
pub mod error;
pub mod mock;
pub mod traits;

pub use apdu::{CommandHeader, StatusWord};
pub use error::{Error, Result};
pub use traits::{CardTransport, CryptoProvider, KeyHandle, KeyId};
