//! Preview rendering: decode, downscale to a fixed width, lossy WebP.

use image::{imageops::FilterType, GenericImageView};

use crate::error::{Result, SyncError};

/// Preview geometry and encoding quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOptions {
    /// Output width in pixels; height follows the original aspect ratio.
    pub width: u32,
    /// Lossy WebP quality, 0-100.
    pub quality: f32,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            width: 480,
            quality: 75.0,
        }
    }
}

/// Largest width or height libwebp can encode.
pub const MAX_WEBP_DIMENSION: u32 = 16_383;

/// File name under which the preview of `source_image_id` is uploaded.
pub fn preview_file_name(source_image_id: &str) -> String {
    format!("preview-{source_image_id}.webp")
}

/// Height that keeps the `width:height` ratio at `target_width`.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (height as f64 * target_width as f64 / width as f64).round() as u32;
    scaled.max(1)
}

/// Render a WebP preview from encoded image bytes (JPEG, PNG, GIF or WebP).
///
/// Images narrower than the target width are enlarged.
pub fn render_preview(original: &[u8], options: &PreviewOptions) -> Result<Vec<u8>> {
    let image = image::load_from_memory(original)
        .map_err(|e| SyncError::EncodeError(format!("Failed to decode image: {e}")))?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SyncError::EncodeError(format!(
            "Image has degenerate dimensions {width}x{height}"
        )));
    }

    let target_height = scaled_height(width, height, options.width);
    if options.width > MAX_WEBP_DIMENSION || target_height > MAX_WEBP_DIMENSION {
        return Err(SyncError::EncodeError(format!(
            "Preview of {width}x{height} image would be {}x{target_height}, over the WebP limit of {MAX_WEBP_DIMENSION}",
            options.width
        )));
    }

    let resized = image.resize_exact(options.width, target_height, FilterType::Lanczos3);
    let rgba = resized.to_rgba8();

    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        .encode_simple(false, options.quality)
        .map_err(|e| SyncError::EncodeError(format!("WebP encoding failed: {e:?}")))?;

    Ok(encoded.to_vec())
}
