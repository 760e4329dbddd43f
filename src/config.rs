// src/config.rs
//
// Optimization settings. `ImageSettings` is the serde-facing shape the host
// application deserializes (TOML section or JSON); `OptimizationConfig` is the
// validated, immutable value the pipeline consumes.

use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_TARGET_WIDTH: u32 = 640;
pub const DEFAULT_TARGET_HEIGHT: u32 = 640;
pub const DEFAULT_QUALITY: u8 = 85;
/// 10 MiB download / payload cap
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Validated per-call optimization policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptimizationConfig {
    target_width: u32,
    target_height: u32,
    quality: u8,
    reject_smaller: bool,
    max_download_bytes: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            quality: DEFAULT_QUALITY,
            reject_smaller: false,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

impl OptimizationConfig {
    pub fn new(
        target_width: u32,
        target_height: u32,
        quality: u8,
        reject_smaller: bool,
        max_download_bytes: u64,
    ) -> Result<Self> {
        if target_width == 0 {
            return Err(IngestError::invalid_config(
                "target_width",
                "0",
                "must be a positive integer",
            ));
        }
        if target_height == 0 {
            return Err(IngestError::invalid_config(
                "target_height",
                "0",
                "must be a positive integer",
            ));
        }
        if !(1..=100).contains(&quality) {
            return Err(IngestError::invalid_config(
                "quality",
                quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if max_download_bytes == 0 {
            return Err(IngestError::invalid_config(
                "max_download_bytes",
                "0",
                "must be a positive integer",
            ));
        }
        Ok(Self {
            target_width,
            target_height,
            quality,
            reject_smaller,
            max_download_bytes,
        })
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    pub fn target_dimensions(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn reject_smaller(&self) -> bool {
        self.reject_smaller
    }

    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_bytes
    }
}

/// Raw image settings as they appear in the host's config file.
///
/// ```toml
/// [images]
/// target_width = 640
/// target_height = 640
/// quality = 85
/// reject_smaller = false
/// max_file_size = 10485760
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub target_width: u32,
    pub target_height: u32,
    pub quality: u32,
    pub reject_smaller: bool,
    #[serde(alias = "max_file_size")]
    pub max_download_bytes: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            quality: DEFAULT_QUALITY as u32,
            reject_smaller: false,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

#[derive(Deserialize)]
struct SettingsFile {
    #[serde(default)]
    images: ImageSettings,
}

impl ImageSettings {
    /// Parse the `[images]` table of a TOML document. A missing table yields
    /// the defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(input)
            .map_err(|e| IngestError::invalid_config("images", "<toml>", e.to_string()))?;
        Ok(file.images)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            IngestError::invalid_config(
                "path",
                path.display().to_string(),
                format!("failed to read settings: {e}"),
            )
        })?;
        Self::from_toml_str(&contents)
    }
}

impl TryFrom<ImageSettings> for OptimizationConfig {
    type Error = IngestError;

    fn try_from(settings: ImageSettings) -> Result<Self> {
        let quality = u8::try_from(settings.quality).map_err(|_| {
            IngestError::invalid_config(
                "quality",
                settings.quality.to_string(),
                "must be between 1 and 100",
            )
        })?;
        OptimizationConfig::new(
            settings.target_width,
            settings.target_height,
            quality,
            settings.reject_smaller,
            settings.max_download_bytes,
        )
    }
}
