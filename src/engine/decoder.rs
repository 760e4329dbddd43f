// src/engine/decoder.rs
//
// Header inspection, policy validation and full decode for JPEG/PNG.

use crate::config::OptimizationConfig;
use crate::engine::common::run_with_panic_policy;
use crate::error::IngestError;
use crate::ops::{ImageFormat, ImageInfo};
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageReader, RgbImage, RgbaImage};
use mozjpeg::{ColorSpace as JpegColorSpace, Decompress};
use std::io::Cursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};

type DecoderResult<T> = std::result::Result<T, IngestError>;

/// Map magic bytes onto the accepted formats.
pub fn detect_format(bytes: &[u8]) -> DecoderResult<ImageFormat> {
    let detected = image::guess_format(bytes)
        .map_err(|_| IngestError::unsupported_format("unknown"))?;
    match detected {
        image::ImageFormat::Jpeg => Ok(ImageFormat::Jpeg),
        image::ImageFormat::Png => Ok(ImageFormat::Png),
        other => Err(IngestError::unsupported_format(
            other
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("unknown"),
        )),
    }
}

/// Read format and dimensions from the header only; the pixel grid is not
/// decoded.
pub fn inspect(bytes: &[u8]) -> DecoderResult<ImageInfo> {
    if bytes.is_empty() {
        return Err(IngestError::empty_image());
    }
    let format = detect_format(bytes)?;

    let reader_format = match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
    };
    let (width, height) = run_with_panic_policy("decode:header", || {
        ImageReader::with_format(Cursor::new(bytes), reader_format)
            .into_dimensions()
            .map_err(|e| IngestError::corrupt_image(format!("failed to read {format} header: {e}")))
    })?;

    if width == 0 || height == 0 {
        return Err(IngestError::corrupt_image(format!(
            "{format} header reports {width}x{height}"
        )));
    }
    check_dimensions(width, height)?;

    Ok(ImageInfo {
        format,
        width,
        height,
        size_bytes: bytes.len() as u64,
    })
}

/// Inspect `bytes` and apply the size policy from `config`.
pub fn validate(bytes: &[u8], config: &OptimizationConfig) -> DecoderResult<ImageInfo> {
    let info = inspect(bytes)?;
    let (target_w, target_h) = config.target_dimensions();
    if config.reject_smaller() && (info.width < target_w || info.height < target_h) {
        return Err(IngestError::image_too_small(
            info.dimensions(),
            (target_w, target_h),
        ));
    }
    Ok(info)
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(IngestError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(IngestError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Full pixel decode of an already validated image.
pub fn decode(bytes: &[u8], info: &ImageInfo) -> DecoderResult<DynamicImage> {
    let img = match info.format {
        ImageFormat::Jpeg => decode_jpeg_mozjpeg(bytes)?,
        ImageFormat::Png => decode_png_zune(bytes)?,
    };
    if (img.width(), img.height()) != info.dimensions() {
        return Err(IngestError::corrupt_image(format!(
            "decoded {}x{} but header declared {}x{}",
            img.width(),
            img.height(),
            info.width,
            info.height
        )));
    }
    Ok(img)
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo).
///
/// libjpeg has no CMYK/YCCK to RGB conversion; those files go through the
/// `image` crate decoder instead.
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(IngestError::corrupt_image("jpeg: missing EOI marker"));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            IngestError::corrupt_image(format!("jpeg: decompress init failed: {e:?}"))
        })?;

        if matches!(
            decompress.color_space(),
            JpegColorSpace::JCS_CMYK | JpegColorSpace::JCS_YCCK
        ) {
            drop(decompress);
            return decode_jpeg_image_crate(data);
        }

        let mut decompress = decompress.rgb().map_err(|e| {
            IngestError::corrupt_image(format!("jpeg: rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width();
        let height = decompress.height();
        if width > MAX_DIMENSION as usize || height > MAX_DIMENSION as usize {
            return Err(IngestError::dimension_exceeds_limit(
                width.max(height) as u32,
                MAX_DIMENSION,
            ));
        }
        let width_u32 = width as u32;
        let height_u32 = height as u32;
        check_dimensions(width_u32, height_u32)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            IngestError::corrupt_image(format!("jpeg: failed to read scanlines: {e:?}"))
        })?;

        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width_u32, height_u32, flat_pixels)
            .ok_or_else(|| IngestError::corrupt_image("jpeg: truncated scanline data"))?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode JPEG with the `image` crate. Handles Adobe CMYK/YCCK, which it
/// converts to RGB.
fn decode_jpeg_image_crate(data: &[u8]) -> DecoderResult<DynamicImage> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| IngestError::corrupt_image(format!("jpeg: decode failed: {e}")))?;
    check_dimensions(img.width(), img.height())?;
    Ok(img)
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(Cursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| IngestError::corrupt_image(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| IngestError::corrupt_image("png: missing header info"))?;

        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(IngestError::corrupt_image(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| IngestError::corrupt_image("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => {
                GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
            }
            ColorSpace::LumaA => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            other => {
                return Err(IngestError::corrupt_image(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };

        img.ok_or_else(|| IngestError::corrupt_image(format!("png: truncated {colorspace:?} data")))
    })
}
