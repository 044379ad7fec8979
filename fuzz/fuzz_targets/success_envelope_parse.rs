#![no_main]

use libfuzzer_sys::fuzz_target;
use pseudo_remote::{parse_success_envelope, RemoteError};

fuzz_target!(|data: &[u8]| {
    let Some((&status_byte, body)) = data.split_first() else {
        return;
    };
    let status = 100 + u16::from(status_byte) * 2;
    let raw = String::from_utf8_lossy(body);
    match parse_success_envelope(status, &raw) {
        Ok(_) => assert!((200..300).contains(&status)),
        Err(RemoteError::Rejected(message)) => assert!(!message.trim().is_empty()),
        Err(_) => {}
    }
});
