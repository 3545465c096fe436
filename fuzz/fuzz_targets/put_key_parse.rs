#![no_main]

use libfuzzer_sys::fuzz_target;
use scp03_core::RotationCommand;
use scp03_platform::CommandHeader;

fuzz_target!(|data: &[u8]| {
    // Card-side decoding must never panic, and any accepted body re-encodes identically
    let Some((&p1, body)) = data.split_first() else {
        return;
    };
    if let Ok(command) = RotationCommand::parse(&CommandHeader::put_key(p1), body) {
        assert_eq!(command.to_bytes(), body);
    }
});
