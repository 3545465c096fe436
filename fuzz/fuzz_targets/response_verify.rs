#![no_main]

use libfuzzer_sys::fuzz_target;
use scp03_core::command::{ExpectedKcvs, EXPECTED_KCVS_LEN};
use scp03_core::verify;

fuzz_target!(|data: &[u8]| {
    // First 10 bytes are the expected KCVs, the rest is the card response
    if data.len() < EXPECTED_KCVS_LEN {
        return;
    }
    let (head, response) = data.split_at(EXPECTED_KCVS_LEN);
    let mut expected = [0u8; EXPECTED_KCVS_LEN];
    expected.copy_from_slice(head);
    let expected = ExpectedKcvs::from_bytes(expected);

    let accepted = verify(response, &expected).is_ok();
    let exact = response.len() == EXPECTED_KCVS_LEN + 2
        && &response[..EXPECTED_KCVS_LEN] == head
        && response[EXPECTED_KCVS_LEN..] == [0x90, 0x00];
    assert_eq!(accepted, exact);
});
