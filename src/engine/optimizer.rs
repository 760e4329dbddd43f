// src/engine/optimizer.rs
//
// Optimization orchestrator:
//   Received -> Validated -> {SkipPath | ResizePath} -> Encoded -> Selected -> Done
// Any stage may fail; the failing stage is logged with the error.

use crate::config::OptimizationConfig;
use crate::engine::decoder;
use crate::engine::encoder::{race_with, to_jpeg_pixels, JpegBackend, MozJpeg, StandardJpeg};
use crate::engine::pipeline;
use crate::error::IngestError;
use crate::ops::{
    ImageFormat, ImageInfo, ProcessingResult, Stage, LABEL_NO_OPTIMIZATION_NEEDED,
    LABEL_ORIGINAL_SMALLER,
};
use std::time::Instant;
use tracing::{debug, info, warn};

type OptimizerResult<T> = std::result::Result<T, IngestError>;

/// Runs the decode / resize / encode-race pipeline over an ordered list of
/// JPEG backends.
pub struct Optimizer {
    backends: Vec<Box<dyn JpegBackend>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Optimizer {
    /// `standard` first, then `alt`.
    pub fn new() -> Self {
        Self::with_backends(vec![Box::new(StandardJpeg), Box::new(MozJpeg)])
    }

    /// Custom race order. The first backend wins exact-size ties.
    pub fn with_backends(backends: Vec<Box<dyn JpegBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Optimize `bytes` under `config`. On the passthrough paths the returned
    /// `data` is `bytes` itself, not a copy.
    pub fn process(
        &self,
        bytes: Vec<u8>,
        config: &OptimizationConfig,
    ) -> OptimizerResult<ProcessingResult> {
        let start = Instant::now();
        let mut stage = Stage::Received;
        debug!(stage = %stage, bytes = bytes.len(), "artwork received");

        match self.run(bytes, config, &mut stage) {
            Ok(result) => {
                advance(&mut stage, Stage::Done);
                info!(
                    original_size = result.original_size(),
                    optimized_size = result.optimized_size(),
                    savings_percent = result.savings_percent,
                    encoder = %result.encoder_label,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "artwork optimized"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(
                    stage = %stage,
                    category = err.category().as_str(),
                    error = %err,
                    "artwork optimization failed"
                );
                Err(err)
            }
        }
    }

    fn run(
        &self,
        bytes: Vec<u8>,
        config: &OptimizationConfig,
        stage: &mut Stage,
    ) -> OptimizerResult<ProcessingResult> {
        let original = decoder::validate(&bytes, config)?;
        advance(stage, Stage::Validated);

        if original.dimensions() == config.target_dimensions() {
            advance(stage, Stage::SkipPath);
            return Ok(passthrough(bytes, original, LABEL_NO_OPTIMIZATION_NEEDED));
        }
        advance(stage, Stage::ResizePath);

        let decoded = decoder::decode(&bytes, &original)?;
        let (target_w, target_h) = config.target_dimensions();
        let resized = pipeline::resize(decoded, target_w, target_h);
        let pixels = to_jpeg_pixels(&resized);
        let (width, height) = pixels.dimensions();

        let backends: Vec<&dyn JpegBackend> =
            self.backends.iter().map(|b| b.as_ref()).collect();
        let outcome = race_with(&backends, &pixels, config.quality())?;
        advance(stage, Stage::Encoded);

        let label = outcome.label();
        let optimized_size = outcome.data.len() as u64;
        let result = if optimized_size >= original.size_bytes {
            debug!(
                original_size = original.size_bytes,
                optimized_size, "re-encode not smaller, keeping original"
            );
            passthrough(bytes, original, LABEL_ORIGINAL_SMALLER)
        } else {
            ProcessingResult {
                data: outcome.data,
                format: ImageFormat::Jpeg,
                encoder_label: label,
                original,
                optimized: ImageInfo {
                    format: ImageFormat::Jpeg,
                    width,
                    height,
                    size_bytes: optimized_size,
                },
                savings_percent: savings_percent(original.size_bytes, optimized_size),
            }
        };
        advance(stage, Stage::Selected);
        Ok(result)
    }
}

/// Optimize with the default backends.
pub fn optimize(bytes: Vec<u8>, config: &OptimizationConfig) -> OptimizerResult<ProcessingResult> {
    Optimizer::new().process(bytes, config)
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
}

fn passthrough(bytes: Vec<u8>, original: ImageInfo, label: &str) -> ProcessingResult {
    ProcessingResult {
        data: bytes,
        format: original.format,
        encoder_label: label.to_string(),
        original,
        optimized: original,
        savings_percent: 0.0,
    }
}

fn savings_percent(original_size: u64, optimized_size: u64) -> f64 {
    if original_size == 0 || optimized_size >= original_size {
        return 0.0;
    }
    (original_size - optimized_size) as f64 / original_size as f64 * 100.0
}
