use crate::config::ImageFormat;
use crate::OptimgError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use image::GenericImageView;
use image::ImageEncoder;

/// Decodes raw image bytes into a memory-resident bitmap.
///
/// Performs format detection from magic bytes before decoding, so malformed
/// or non-image input fails here rather than deep inside a codec. Supports
/// JPEG, PNG, WebP and the other formats the `image` crate recognizes.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OptimgError> {
    let guessed = image::guess_format(bytes)
        .map_err(|e| OptimgError::Decode(e.to_string()))?;

    image::load_from_memory_with_format(bytes, guessed)
        .map_err(|e| OptimgError::Decode(e.to_string()))
}

/// Scales an image down to `max_width`, preserving aspect ratio.
///
/// Images at or under the bound pass through untouched; `width == max_width`
/// is a no-op, not an error. Target height is `round(h * max_width / w)`.
/// Lanczos3 provides best quality for downsampling.
pub fn resize_to_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (orig_w, orig_h) = img.dimensions();
    if orig_w <= max_width {
        return img;
    }

    let ratio = max_width as f64 / orig_w as f64;
    let target_h = ((orig_h as f64 * ratio).round() as u32).max(1);

    img.resize_exact(max_width, target_h, image::imageops::FilterType::Lanczos3)
}

/// Encodes a bitmap to the requested format with quality control.
///
/// Color-mode normalization happens here, right before encode:
/// - **JPEG**: alpha-carrying or palette-derived bitmaps flatten to opaque
///   RGB. Alpha is dropped, not composited; transparent pixels keep whatever
///   RGB values the decoder produced.
/// - **WebP**: bitmaps with an alpha channel encode as RGBA (alpha
///   preserved), opaque bitmaps as RGB.
pub fn encode_image(
    img: &DynamicImage,
    fmt: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, OptimgError> {
    let quality = quality.clamp(1, 100);

    match fmt {
        ImageFormat::jpeg => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let mut out = Vec::new();
            let enc = JpegEncoder::new_with_quality(&mut out, quality);
            enc.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| OptimgError::Encode(e.to_string()))?;
            Ok(out)
        }
        ImageFormat::webp => {
            let q = quality as f32;
            if img.color().has_alpha() {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                let encoder = webp::Encoder::from_rgba(rgba.as_raw(), w, h);
                Ok(encoder.encode(q).to_vec())
            } else {
                let rgb = img.to_rgb8();
                let (w, h) = rgb.dimensions();
                let encoder = webp::Encoder::from_rgb(rgb.as_raw(), w, h);
                Ok(encoder.encode(q).to_vec())
            }
        }
    }
}

/// Full decode -> resize -> encode pipeline for one source image.
///
/// CPU-bound; callers on an async runtime should run this on a blocking
/// worker.
pub fn transcode(
    raw: &[u8],
    max_width: u32,
    quality: u8,
    format: ImageFormat,
) -> Result<Vec<u8>, OptimgError> {
    let img = decode_image(raw)?;
    let img = resize_to_width(img, max_width);
    encode_image(&img, format, quality)
}
