// src/error.rs
//
// Unified error handling for artwork-ingest
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - Validation: bad request, bad source, unsupported or undersized image
// - Download: the remote fetch failed for reasons tied to the supplied URL
// - Unprocessable: bytes looked like an image but could not be decoded/encoded
// - NotFound: the target entity does not exist
// - Internal: repository failures and contained codec panics

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, client can fix it
    Validation,
    /// Remote download failed (non-2xx, wrong content type, too large, timeout)
    Download,
    /// Decode or encode failure on well-formed-looking bytes
    Unprocessable,
    /// Target entity missing
    NotFound,
    /// Server-side failure (should not happen)
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "ValidationError",
            ErrorCategory::Download => "DownloadError",
            ErrorCategory::Unprocessable => "UnprocessableImage",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Internal => "InternalError",
        }
    }

    /// HTTP status code the boundary layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::Validation | ErrorCategory::Download => 400,
            ErrorCategory::Unprocessable => 422,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Internal => 500,
        }
    }
}

/// artwork-ingest error types
///
/// Every variant carries its context as fields so callers never have to
/// match on message text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    // Request / Source Errors
    #[error("Upload request must contain either 'url' or 'image'")]
    MissingSource,

    #[error("Upload request must contain only one of 'url' or 'image'")]
    AmbiguousSource,

    #[error("Invalid upload request body: {message}")]
    InvalidRequestBody { message: Cow<'static, str> },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        url: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid base64 image payload: {message}")]
    InvalidBase64 { message: Cow<'static, str> },

    #[error("Image payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: u64, max: u64 },

    // Download Errors
    #[error("Download failed with HTTP status {status}")]
    DownloadFailed { status: u16 },

    #[error("Download returned non-image content type '{content_type}'")]
    UnexpectedContentType { content_type: Cow<'static, str> },

    #[error("Download response exceeds maximum of {max} bytes")]
    ResponseTooLarge { max: u64 },

    #[error("Download timed out: {url}")]
    DownloadTimeout { url: Cow<'static, str> },

    #[error("Download failed: {message}")]
    DownloadTransport { message: Cow<'static, str> },

    #[error("Download cancelled by caller")]
    Cancelled,

    // Validation Errors
    #[error("Image data is empty")]
    EmptyImage,

    #[error("Unsupported image format: {format}. Only JPEG and PNG are accepted")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Image {width}x{height} is smaller than required {min_width}x{min_height}")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidConfig {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Codec Errors
    #[error("Corrupted image data: {message}")]
    CorruptImage { message: Cow<'static, str> },

    #[error("Encoder '{encoder}' failed: {message}")]
    EncodeFailed {
        encoder: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("All JPEG encoders failed: {message}")]
    EncodingFailed { message: Cow<'static, str> },

    // Entity Errors
    #[error("{kind} '{id}' not found")]
    EntityNotFound {
        kind: Cow<'static, str>,
        id: Cow<'static, str>,
    },

    #[error("Repository operation failed: {message}")]
    RepositoryFailed { message: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl IngestError {
    pub fn missing_source() -> Self {
        Self::MissingSource
    }

    pub fn ambiguous_source() -> Self {
        Self::AmbiguousSource
    }

    pub fn invalid_request_body(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequestBody {
            message: message.into(),
        }
    }

    pub fn invalid_url(
        url: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_base64(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidBase64 {
            message: message.into(),
        }
    }

    pub fn payload_too_large(size: u64, max: u64) -> Self {
        Self::PayloadTooLarge { size, max }
    }

    pub fn download_failed(status: u16) -> Self {
        Self::DownloadFailed { status }
    }

    pub fn unexpected_content_type(content_type: impl Into<Cow<'static, str>>) -> Self {
        Self::UnexpectedContentType {
            content_type: content_type.into(),
        }
    }

    pub fn response_too_large(max: u64) -> Self {
        Self::ResponseTooLarge { max }
    }

    pub fn download_timeout(url: impl Into<Cow<'static, str>>) -> Self {
        Self::DownloadTimeout { url: url.into() }
    }

    pub fn download_transport(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DownloadTransport {
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn empty_image() -> Self {
        Self::EmptyImage
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn image_too_small(have: (u32, u32), want: (u32, u32)) -> Self {
        Self::ImageTooSmall {
            width: have.0,
            height: have.1,
            min_width: want.0,
            min_height: want.1,
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_config(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupt_image(message: impl Into<Cow<'static, str>>) -> Self {
        Self::CorruptImage {
            message: message.into(),
        }
    }

    pub fn encode_failed(
        encoder: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            encoder: encoder.into(),
            message: message.into(),
        }
    }

    pub fn encoding_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    pub fn entity_not_found(
        kind: impl Into<Cow<'static, str>>,
        id: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EntityNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn repository_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::RepositoryFailed {
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// True when the failure is about the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        match self.category() {
            ErrorCategory::Validation
            | ErrorCategory::Download
            | ErrorCategory::Unprocessable
            | ErrorCategory::NotFound => true,
            ErrorCategory::Internal => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingSource
            | Self::AmbiguousSource
            | Self::InvalidRequestBody { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidBase64 { .. }
            | Self::PayloadTooLarge { .. }
            | Self::EmptyImage
            | Self::UnsupportedFormat { .. }
            | Self::ImageTooSmall { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::InvalidConfig { .. } => ErrorCategory::Validation,

            // Cancellation is reported with the download it interrupted.
            Self::DownloadFailed { .. }
            | Self::UnexpectedContentType { .. }
            | Self::ResponseTooLarge { .. }
            | Self::DownloadTimeout { .. }
            | Self::DownloadTransport { .. }
            | Self::Cancelled => ErrorCategory::Download,

            Self::CorruptImage { .. } | Self::EncodeFailed { .. } | Self::EncodingFailed { .. } => {
                ErrorCategory::Unprocessable
            }

            Self::EntityNotFound { .. } => ErrorCategory::NotFound,

            Self::RepositoryFailed { .. } | Self::InternalPanic { .. } => ErrorCategory::Internal,
        }
    }

    /// Shortcut for `self.category().http_status()`.
    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, IngestError>;
