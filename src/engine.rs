// src/engine.rs
//
// The ingestion engine. One call runs:
// 1. Source acquisition (bounded HTTP download or base64 payload)
// 2. Header validation against the format whitelist and size policy
// 3. Decode + bounding-box resize
// 4. JPEG encoder race, keeping the smaller output
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger images are rejected from the header alone, before any pixel decode.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
mod decoder;
mod encoder;
mod fetch;
mod io;
mod optimizer;
mod pipeline;

pub use common::run_with_panic_policy;
pub use decoder::{check_dimensions, decode, detect_format, inspect, validate};
pub use encoder::{
    race, race_with, to_jpeg_pixels, JpegBackend, MozJpeg, RaceEntry, RaceOutcome, StandardJpeg,
    DEFAULT_BACKENDS,
};
pub use fetch::{CancelToken, HttpFetcher, ValidatedUrl, FETCH_TIMEOUT};
pub use io::{acquire, decode_base64_payload, Source, UploadRequest};
pub use optimizer::{optimize, Optimizer};
pub use pipeline::{calc_fit_dimensions, resize};
