//! GlobalPlatform command headers and ISO 7816 status words.

use crate::{Error, Result};
use core::fmt;

/// GlobalPlatform command class byte.
pub const CLA_GP: u8 = 0x80;

/// PUT KEY instruction.
pub const INS_PUT_KEY: u8 = 0xD8;

/// PUT KEY P2: multiple keys, starting at key identifier 1.
pub const P2_MULTIPLE_KEYS: u8 = 0x81;

/// Largest command data field of a short APDU.
pub const MAX_SHORT_LC: usize = 255;

/// The four-byte `CLA INS P1 P2` command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Class byte.
    pub cla: u8,
    /// Instruction byte.
    pub ins: u8,
    /// Parameter 1.
    pub p1: u8,
    /// Parameter 2.
    pub p2: u8,
}

impl CommandHeader {
    /// Header for a multi-key PUT KEY replacing key version `key_version`.
    pub fn put_key(key_version: u8) -> Self {
        Self {
            cla: CLA_GP,
            ins: INS_PUT_KEY,
            p1: key_version,
            p2: P2_MULTIPLE_KEYS,
        }
    }

    /// Wire bytes of the header.
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Encode a short Case-4 APDU: `CLA INS P1 P2 Lc data Le`, with `Le = 0x00`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidApdu` if `data` is empty or longer than 255 bytes.
    pub fn encode_case4(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() || data.len() > MAX_SHORT_LC {
            return Err(Error::InvalidApdu(format!(
                "Case-4 data length {} outside 1..={}",
                data.len(),
                MAX_SHORT_LC
            )));
        }
        let mut buf = Vec::with_capacity(4 + 1 + data.len() + 1);
        buf.extend_from_slice(&self.to_bytes());
        buf.push(data.len() as u8);
        buf.extend_from_slice(data);
        buf.push(0x00);
        Ok(buf)
    }
}

/// ISO 7816 status word (`SW1 SW2`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u16);

impl StatusWord {
    /// Success (No Error).
    pub const SUCCESS: StatusWord = StatusWord(0x9000);
    /// Wrong length.
    pub const WRONG_LENGTH: StatusWord = StatusWord(0x6700);
    /// Security condition not satisfied.
    pub const SECURITY_STATUS_NOT_SATISFIED: StatusWord = StatusWord(0x6982);
    /// Conditions of use not satisfied.
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord(0x6985);
    /// Wrong data.
    pub const WRONG_DATA: StatusWord = StatusWord(0x6A80);
    /// Function not supported.
    pub const FUNC_NOT_SUPPORTED: StatusWord = StatusWord(0x6A81);
    /// Not enough memory space.
    pub const FILE_FULL: StatusWord = StatusWord(0x6A84);
    /// Incorrect parameters P1-P2.
    pub const INCORRECT_P1P2: StatusWord = StatusWord(0x6A86);
    /// Referenced data not found.
    pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord(0x6A88);
    /// INS value not supported.
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord(0x6D00);
    /// CLA value not supported.
    pub const CLA_NOT_SUPPORTED: StatusWord = StatusWord(0x6E00);

    /// Build from the two wire bytes.
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self(((sw1 as u16) << 8) | sw2 as u16)
    }

    /// Build from the big-endian 16-bit value.
    pub const fn from_u16(value: u16) -> Self {
        Self(value)
    }

    /// Big-endian 16-bit value.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// First status byte.
    pub const fn sw1(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Second status byte.
    pub const fn sw2(self) -> u8 {
        self.0 as u8
    }

    /// Wire bytes.
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// True for `0x9000`.
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Human-readable meaning for well-known status words.
    pub fn description(self) -> Option<&'static str> {
        let text = match self {
            Self::SUCCESS => "success",
            Self::WRONG_LENGTH => "wrong length",
            Self::SECURITY_STATUS_NOT_SATISFIED => "security status not satisfied",
            Self::CONDITIONS_NOT_SATISFIED => "conditions of use not satisfied",
            Self::WRONG_DATA => "wrong data",
            Self::FUNC_NOT_SUPPORTED => "function not supported",
            Self::FILE_FULL => "not enough memory space",
            Self::INCORRECT_P1P2 => "incorrect parameters P1-P2",
            Self::REFERENCED_DATA_NOT_FOUND => "referenced data not found",
            Self::INS_NOT_SUPPORTED => "instruction not supported",
            Self::CLA_NOT_SUPPORTED => "class not supported",
            _ => return None,
        };
        Some(text)
    }

    /// Split a raw response into its data field and trailing status word.
    ///
    /// Returns `None` when the response is shorter than two bytes.
    pub fn split_response(response: &[u8]) -> Option<(&[u8], StatusWord)> {
        if response.len() < 2 {
            return None;
        }
        let (data, sw) = response.split_at(response.len() - 2);
        Some((data, StatusWord::new(sw[0], sw[1])))
    }
}

impl fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusWord(0x{:04X})", self.0)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "0x{:04X} ({})", self.0, text),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}
