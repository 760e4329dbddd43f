// src/ops.rs
//
// Data model shared by the ingestion pipeline.
// Everything here is created per request and never mutated after construction.

use serde::Serialize;
use std::fmt;

/// Encoder label used when the source already has the target dimensions.
pub const LABEL_NO_OPTIMIZATION_NEEDED: &str = "original (no optimization needed)";

/// Encoder label used when re-encoding did not beat the original size.
pub const LABEL_ORIGINAL_SMALLER: &str = "original (smaller than optimized)";

/// Accepted input formats. Adding a variant forces every match below to be
/// revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Resolve a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Resolve a MIME type such as `image/jpeg; charset=binary`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format, dimensions and byte size of an encoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl ImageInfo {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Outcome of one optimization run.
///
/// `optimized` always describes `data`; on the fallback paths it equals
/// `original`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessingResult {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub encoder_label: String,
    pub original: ImageInfo,
    pub optimized: ImageInfo,
    pub savings_percent: f64,
}

impl ProcessingResult {
    pub fn original_size(&self) -> u64 {
        self.original.size_bytes
    }

    pub fn optimized_size(&self) -> u64 {
        self.optimized.size_bytes
    }

    /// True when `data` is the caller's input, untouched.
    pub fn is_passthrough(&self) -> bool {
        self.encoder_label == LABEL_NO_OPTIMIZATION_NEEDED
            || self.encoder_label == LABEL_ORIGINAL_SMALLER
    }
}

/// Orchestrator states, in the order a successful run visits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    SkipPath,
    ResizePath,
    Encoded,
    Selected,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::SkipPath => "skip",
            Stage::ResizePath => "resize",
            Stage::Encoded => "encoded",
            Stage::Selected => "selected",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
