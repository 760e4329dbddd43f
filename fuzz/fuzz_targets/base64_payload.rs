#![no_main]

use artwork_ingest::engine::decode_base64_payload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(bytes) = decode_base64_payload(payload, 1 << 16) {
        assert!(bytes.len() <= 1 << 16);
    }
});
