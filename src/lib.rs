// lib.rs
//
// artwork-ingest: artist and track artwork ingestion.
//
// Accepts an image by URL or inline base64, validates it, scales it into a
// bounding box and re-encodes it as the smaller of two independent JPEG
// encoders' outputs. The original bytes are kept whenever re-encoding would
// not shrink them.

// Memory allocator optimization - jemalloc for large pixel buffers
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod service;

pub use config::{ImageSettings, OptimizationConfig};
pub use engine::{optimize, CancelToken, HttpFetcher, Optimizer, Source, UploadRequest};
pub use error::{ErrorCategory, IngestError, Result};
pub use ops::{ImageFormat, ImageInfo, ProcessingResult, Stage};
pub use service::{
    EntityKind, EntityRecord, EntityRepository, StoredImage, UploadResponse, UploadService,
};
