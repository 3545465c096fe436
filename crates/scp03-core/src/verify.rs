//! PUT KEY response verification.
//!
//! A card confirms a rotation by returning the new key version and the KCV
//! of each installed key, followed by `90 00`. The KCVs are computed by the
//! card from the keys it decrypted, so a match proves both sides hold the
//! same keyset.

use crate::command::ExpectedKcvs;
use crate::{Error, Result};
use scp03_platform::StatusWord;
use subtle::ConstantTimeEq;

/// A raw response split into data and status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationResponse<'a> {
    /// Bytes before the status word.
    pub data: &'a [u8],
    /// Trailing status word.
    pub status: StatusWord,
}

impl<'a> RotationResponse<'a> {
    /// Split `response` into data and status word.
    ///
    /// # Errors
    ///
    /// `Error::MalformedResponse` if shorter than two bytes.
    pub fn parse(response: &'a [u8]) -> Result<Self> {
        let (data, status) = StatusWord::split_response(response).ok_or(Error::MalformedResponse {
            len: response.len(),
        })?;
        Ok(Self { data, status })
    }
}

/// Check a PUT KEY response against the locally computed KCVs.
///
/// Pure function: the same inputs always give the same result.
///
/// # Errors
///
/// - `Error::MalformedResponse` if the response has no status word
/// - `Error::TransportStatus` if the status word is not `90 00`
/// - `Error::IntegrityMismatch` if the data differs from `expected` in length
///   or content
///
/// # Example
///
/// ```
/// use scp03_core::command::ExpectedKcvs;
/// use scp03_core::verify::verify;
///
/// let expected = ExpectedKcvs::from_bytes([0x0B, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
/// let mut response = expected.as_bytes().to_vec();
/// response.extend_from_slice(&[0x90, 0x00]);
/// assert!(verify(&response, &expected).is_ok());
/// ```
pub fn verify(response: &[u8], expected: &ExpectedKcvs) -> Result<()> {
    let parsed = RotationResponse::parse(response)?;

    if !parsed.status.is_success() {
        return Err(Error::TransportStatus(parsed.status));
    }

    // ct_eq on slices of different length returns false without comparing
    if !bool::from(parsed.data.ct_eq(expected.as_bytes())) {
        return Err(Error::IntegrityMismatch {
            expected: hex::encode(expected.as_bytes()),
            actual: hex::encode(parsed.data),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> ExpectedKcvs {
        ExpectedKcvs::from_bytes([0x01, 0xBF, 0xBE, 0xBD, 0xBF, 0xBE, 0xBD, 0xBF, 0xBE, 0xBD])
    }

    fn response_with(data: &[u8], sw: [u8; 2]) -> Vec<u8> {
        let mut response = data.to_vec();
        response.extend_from_slice(&sw);
        response
    }

    #[test]
    fn test_verify_success() {
        let response = response_with(expected().as_bytes(), [0x90, 0x00]);
        assert!(verify(&response, &expected()).is_ok());
    }

    #[test]
    fn test_verify_short_response() {
        for len in 0..2 {
            let response = vec![0x90; len];
            assert!(matches!(
                verify(&response, &expected()).unwrap_err(),
                Error::MalformedResponse { len: l } if l == len
            ));
        }
    }

    #[test]
    fn test_verify_status_checked_before_data() {
        let response = response_with(expected().as_bytes(), [0x6A, 0x80]);
        assert!(matches!(
            verify(&response, &expected()).unwrap_err(),
            Error::TransportStatus(StatusWord::WRONG_DATA)
        ));

        assert!(matches!(
            verify(&[0x69, 0x82], &expected()).unwrap_err(),
            Error::TransportStatus(StatusWord::SECURITY_STATUS_NOT_SATISFIED)
        ));
    }

    #[test]
    fn test_verify_flipped_kcv_byte() {
        let mut data = *expected().as_bytes();
        data[4] ^= 0x01;
        let err = verify(&response_with(&data, [0x90, 0x00]), &expected()).unwrap_err();

        match err {
            Error::IntegrityMismatch { expected: e, actual } => {
                assert_eq!(e, "01bfbebdbfbebdbfbebd");
                assert_eq!(actual, "01bfbebdbebebdbfbebd");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_verify_length_mismatch() {
        let kcvs = expected();
        let data = kcvs.as_bytes();
        let cases: [&[u8]; 2] = [&data[..9], &[]];
        for bad in cases {
            assert!(matches!(
                verify(&response_with(bad, [0x90, 0x00]), &expected()).unwrap_err(),
                Error::IntegrityMismatch { .. }
            ));
        }

        let mut long = data.to_vec();
        long.push(0x00);
        assert!(verify(&response_with(&long, [0x90, 0x00]), &expected()).is_err());
    }

    #[test]
    fn test_verify_is_repeatable() {
        let good = response_with(expected().as_bytes(), [0x90, 0x00]);
        let bad = response_with(&[0u8; 10], [0x90, 0x00]);
        for _ in 0..3 {
            assert!(verify(&good, &expected()).is_ok());
            assert!(verify(&bad, &expected()).is_err());
        }
    }
}
