// src/engine/pipeline.rs
//
// Bounding-box resize: uniform scale, never upscales, floors both axes.

use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, RgbImage, RgbaImage};
use tracing::{debug, warn};

/// Output dimensions for fitting `orig` inside `target`.
///
/// `scale = min(tw/w, th/h)`; when `scale >= 1` the original dimensions are
/// returned. Computed in integers so the constraining axis lands exactly on
/// the target and the other axis is `floor(len * scale)`, clamped to 1.
pub fn calc_fit_dimensions(orig_w: u32, orig_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if orig_w == 0 || orig_h == 0 || target_w == 0 || target_h == 0 {
        return (orig_w, orig_h);
    }
    if orig_w <= target_w && orig_h <= target_h {
        return (orig_w, orig_h);
    }

    let (w, h) = (orig_w as u64, orig_h as u64);
    let (tw, th) = (target_w as u64, target_h as u64);

    // tw/w <= th/h  <=>  tw*h <= th*w
    if tw * h <= th * w {
        let new_h = (h * tw / w).max(1);
        (target_w, new_h as u32)
    } else {
        let new_w = (w * th / h).max(1);
        (new_w as u32, target_h)
    }
}

/// Fit `img` inside `target_w x target_h`. Returns the input untouched when
/// it already fits.
pub fn resize(img: DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let (src_w, src_h) = (img.width(), img.height());
    let (dst_w, dst_h) = calc_fit_dimensions(src_w, src_h, target_w, target_h);
    if (dst_w, dst_h) == (src_w, src_h) {
        return img;
    }
    debug!(src_w, src_h, dst_w, dst_h, "resizing artwork");

    let src = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let pixel_type = if src.color().has_alpha() {
        PixelType::U8x4
    } else {
        PixelType::U8x3
    };

    match fast_resize(src_w, src_h, src.as_bytes(), pixel_type, dst_w, dst_h) {
        Ok(resized) => resized,
        Err(reason) => {
            warn!(%reason, "fast resize failed, using image crate fallback");
            resize_with_image_crate(&src, dst_w, dst_h)
        }
    }
}

fn resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom))
}

fn fast_resize(
    src_width: u32,
    src_height: u32,
    src_pixels: &[u8],
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let required_bytes = (src_width as usize)
        .checked_mul(src_height as usize)
        .and_then(|n| n.checked_mul(pixel_type.size()))
        .ok_or_else(|| "image buffer size overflow during resize".to_string())?;
    if src_pixels.len() < required_bytes {
        return Err(format!(
            "source buffer too small: expected {required_bytes} bytes, got {}",
            src_pixels.len()
        ));
    }

    // fir wants a mutable buffer for in-place alpha premultiplication
    let mut working = src_pixels[..required_bytes].to_vec();
    let src_image = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        working.as_mut_slice(),
        pixel_type,
    ) {
        Ok(image) => image,
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            aligned
                .buffer_mut()
                .copy_from_slice(&src_pixels[..required_bytes]);
            return resize_image(aligned, pixel_type, dst_width, dst_height);
        }
        Err(other) => return Err(format!("fir source image error: {other:?}")),
    };
    resize_image(src_image, pixel_type, dst_width, dst_height)
}

fn resize_image(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let needs_premultiply = pixel_type == PixelType::U8x4;

    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}

/// Pure image crate Catmull-Rom path. Keeps the 8-bit RGB/RGBA layout of `src`.
fn resize_with_image_crate(src: &DynamicImage, dst_width: u32, dst_height: u32) -> DynamicImage {
    src.resize_exact(dst_width, dst_height, FilterType::CatmullRom)
}
