#![no_main]

use arbitrary::Arbitrary;
use artwork_ingest::engine::{decode, validate};
use artwork_ingest::OptimizationConfig;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    target_width: u16,
    target_height: u16,
    reject_smaller: bool,
    data: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let Ok(config) = OptimizationConfig::new(
        u32::from(input.target_width.max(1)),
        u32::from(input.target_height.max(1)),
        85,
        input.reject_smaller,
        1 << 24,
    ) else {
        return;
    };

    // Header-validated input must decode or fail cleanly, never panic.
    if let Ok(info) = validate(input.data, &config) {
        if u64::from(info.width) * u64::from(info.height) <= 4_000_000 {
            let _ = decode(input.data, &info);
        }
    }
});
