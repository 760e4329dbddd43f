// src/engine/encoder.rs
//
// JPEG encoder race: every backend encodes the same RGB buffer at the same
// quality and the smallest output wins. Ties go to the backend listed first.

use crate::engine::common::run_with_panic_policy;
use crate::error::IngestError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, RgbImage};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use rayon::prelude::*;
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::engine::MAX_DIMENSION;

type EncoderResult<T> = std::result::Result<T, IngestError>;

/// A JPEG encoder taking part in the race.
pub trait JpegBackend: Send + Sync {
    /// Short name used in the result label.
    fn name(&self) -> &'static str;

    fn encode(&self, pixels: &RgbImage, quality: u8) -> EncoderResult<Vec<u8>>;
}

/// Baseline encoder from the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardJpeg;

/// mozjpeg: progressive scans, optimized Huffman tables, trellis quantization.
#[derive(Clone, Copy, Debug, Default)]
pub struct MozJpeg;

/// Race order. The first entry wins exact-size ties.
pub const DEFAULT_BACKENDS: [&dyn JpegBackend; 2] = [&StandardJpeg, &MozJpeg];

impl JpegBackend for StandardJpeg {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn encode(&self, pixels: &RgbImage, quality: u8) -> EncoderResult<Vec<u8>> {
        run_with_panic_policy("encode:standard", || {
            let (w, h) = pixels.dimensions();
            check_encodable(w, h)?;

            let mut output = Vec::with_capacity(estimated_size(w, h));
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
            encoder
                .encode(pixels.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| IngestError::encode_failed(self.name(), e.to_string()))?;
            Ok(output)
        })
    }
}

impl JpegBackend for MozJpeg {
    fn name(&self) -> &'static str {
        "alt"
    }

    fn encode(&self, pixels: &RgbImage, quality: u8) -> EncoderResult<Vec<u8>> {
        run_with_panic_policy("encode:mozjpeg", || {
            let (w, h) = pixels.dimensions();
            check_encodable(w, h)?;

            let raw: &[u8] = pixels.as_raw();
            let expected_len = (w as usize) * (h as usize) * 3;
            if raw.len() != expected_len {
                return Err(IngestError::encode_failed(
                    self.name(),
                    format!("pixel buffer is {} bytes, expected {expected_len}", raw.len()),
                ));
            }

            let mut comp = Compress::new(ColorSpace::JCS_RGB);
            comp.set_size(w as usize, h as usize);
            comp.set_color_space(ColorSpace::JCS_YCbCr);
            comp.set_quality(quality.clamp(1, 100) as f32);
            comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

            let mut output = Vec::with_capacity(estimated_size(w, h));
            {
                let mut writer = comp.start_compress(&mut output).map_err(|e| {
                    IngestError::encode_failed(self.name(), format!("start compress: {e:?}"))
                })?;

                let stride = w as usize * 3;
                for row in raw.chunks(stride) {
                    writer.write_scanlines(row).map_err(|e| {
                        IngestError::encode_failed(self.name(), format!("write scanlines: {e:?}"))
                    })?;
                }

                writer.finish().map_err(|e| {
                    IngestError::encode_failed(self.name(), format!("finish: {e:?}"))
                })?;
            }
            Ok(output)
        })
    }
}

fn check_encodable(w: u32, h: u32) -> EncoderResult<()> {
    if w == 0 || h == 0 {
        return Err(IngestError::corrupt_image(format!(
            "cannot encode a {w}x{h} image"
        )));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(IngestError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
    }
    Ok(())
}

fn estimated_size(w: u32, h: u32) -> usize {
    (w as usize * h as usize * 3 / 10).max(4096)
}

/// One backend's result in a race.
#[derive(Clone, Debug, PartialEq)]
pub struct RaceEntry {
    pub encoder: &'static str,
    pub size: Option<usize>,
}

impl RaceEntry {
    fn label(&self) -> String {
        match self.size {
            Some(size) => format!("{} ({} KB)", self.encoder, size / 1024),
            None => format!("{} (failed)", self.encoder),
        }
    }
}

/// Winning bytes plus the audit trail of every backend.
#[derive(Clone, Debug)]
pub struct RaceOutcome {
    pub data: Vec<u8>,
    pub winner: &'static str,
    /// Winner first, then the remaining backends in race order
    pub entries: Vec<RaceEntry>,
}

impl RaceOutcome {
    /// e.g. `"alt (98 KB) vs standard (120 KB)"`
    pub fn label(&self) -> String {
        self.entries
            .iter()
            .map(RaceEntry::label)
            .collect::<Vec<_>>()
            .join(" vs ")
    }
}

/// Flatten to 8-bit RGB for JPEG. Alpha is composited over white.
pub fn to_jpeg_pixels(img: &DynamicImage) -> Cow<'_, RgbImage> {
    match img {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            let (w, h) = rgba.dimensions();
            let flattened = RgbImage::from_fn(w, h, |x, y| {
                let [r, g, b, a] = rgba.get_pixel(x, y).0;
                let a = a as u32;
                let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
                image::Rgb([blend(r), blend(g), blend(b)])
            });
            Cow::Owned(flattened)
        }
        other => Cow::Owned(other.to_rgb8()),
    }
}

/// Race the default backends.
pub fn race(pixels: &RgbImage, quality: u8) -> EncoderResult<RaceOutcome> {
    race_with(&DEFAULT_BACKENDS, pixels, quality)
}

/// Encode with every backend in parallel and keep the smallest output.
pub fn race_with(
    backends: &[&dyn JpegBackend],
    pixels: &RgbImage,
    quality: u8,
) -> EncoderResult<RaceOutcome> {
    if backends.is_empty() {
        return Err(IngestError::encoding_failed("no JPEG encoders configured"));
    }

    // Indexed collect keeps race order regardless of completion order.
    let results: Vec<(&'static str, EncoderResult<Vec<u8>>)> = backends
        .par_iter()
        .map(|backend| (backend.name(), backend.encode(pixels, quality)))
        .collect();

    let mut winner: Option<usize> = None;
    for (idx, (name, result)) in results.iter().enumerate() {
        match result {
            Ok(data) => {
                debug!(encoder = name, size = data.len(), "jpeg encode finished");
                let smaller = match winner {
                    Some(best) => match &results[best].1 {
                        Ok(best_data) => data.len() < best_data.len(),
                        Err(_) => true,
                    },
                    None => true,
                };
                if smaller {
                    winner = Some(idx);
                }
            }
            Err(err) => warn!(encoder = name, error = %err, "jpeg encoder failed"),
        }
    }

    let Some(winner_idx) = winner else {
        let reasons = results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| format!("{name}: {e}")))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(IngestError::encoding_failed(reasons));
    };

    let entry = |(name, result): &(&'static str, EncoderResult<Vec<u8>>)| RaceEntry {
        encoder: *name,
        size: result.as_ref().ok().map(Vec::len),
    };
    let mut entries = Vec::with_capacity(results.len());
    entries.push(entry(&results[winner_idx]));
    entries.extend(
        results
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != winner_idx)
            .map(|(_, r)| entry(r)),
    );

    let (winner_name, winner_result) = results.into_iter().nth(winner_idx).ok_or_else(|| {
        IngestError::internal_panic("race winner index out of range")
    })?;
    let data = winner_result?;

    Ok(RaceOutcome {
        data,
        winner: winner_name,
        entries,
    })
}
