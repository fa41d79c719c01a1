//! Thumbnail decoding and downscaling.

use image::RgbaImage;
use image::imageops::FilterType;

use crate::api::ApiError;

/// Why a thumbnail couldn't be produced. The item keeps its generic icon either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// Request failed
    Fetch(ApiError),
    /// Server answered with an empty body
    Empty,
    /// Bytes aren't a supported image
    Decode(String),
    /// Decode task panicked or was dropped
    Task(String),
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "Fetch failed: {e}"),
            Self::Empty => write!(f, "Empty thumbnail body"),
            Self::Decode(msg) => write!(f, "Couldn't decode thumbnail: {msg}"),
            Self::Task(msg) => write!(f, "Decode task failed: {msg}"),
        }
    }
}

impl std::error::Error for ThumbnailError {}

/// Decodes image bytes and shrinks the result to fit in `width` x `height`.
///
/// Images already inside the box are kept at their size. Larger ones are scaled down
/// with a smoothing filter, preserving the aspect ratio.
pub fn decode_thumbnail(bytes: &[u8], width: u32, height: u32) -> Result<RgbaImage, ThumbnailError> {
    if bytes.is_empty() {
        return Err(ThumbnailError::Empty);
    }
    let image = image::load_from_memory(bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    let image = if image.width() > width || image.height() > height {
        image.resize(width.max(1), height.max(1), FilterType::Triangle)
    } else {
        image
    };
    Ok(image.to_rgba8())
}
