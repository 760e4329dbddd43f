#![no_main]

use artwork_ingest::{Source, UploadRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(request) = UploadRequest::from_json(body) else {
        return;
    };
    if let Ok(Source::Url(url)) = request.into_source() {
        assert!(url.as_str().starts_with("http://") || url.as_str().starts_with("https://"));
    }
});
