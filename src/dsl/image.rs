//! Compile-time image literals: a picture file becomes 16×16 comma-separated
//! `#rrggbb` colors, row-major.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Width and height of the LED matrix.
pub const IMAGE_SIZE: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Could not load image '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Turns an image path from source code into a pixel literal.
pub trait ImageLoader {
    fn load(&self, path: &str) -> Result<String, ImageError>;
}

/// Reads images from disk, resolving relative paths against `root`.
#[derive(Debug, Clone, Default)]
pub struct FileImageLoader {
    root: PathBuf,
}

impl FileImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &str) -> Result<String, ImageError> {
        let full = self.root.join(path);
        debug!(path = %full.display(), "loading image");
        let picture = image::open(&full).map_err(|source| ImageError::Decode {
            path: full.display().to_string(),
            source,
        })?;
        Ok(pixel_literal(&picture))
    }
}

/// All pixels off.
pub fn black_image() -> String {
    vec!["#000000"; (IMAGE_SIZE * IMAGE_SIZE) as usize].join(",")
}

/// Resize to the matrix, composite over black and keep 4 bits per channel.
pub fn pixel_literal(picture: &DynamicImage) -> String {
    let resized = picture
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgba8();
    resized
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            format!("#{:02x}{:02x}{:02x}", quantize(r, a), quantize(g, a), quantize(b, a))
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn quantize(channel: u8, alpha: u8) -> u8 {
    let over_black = u16::from(channel) * u16::from(alpha) / 255;
    let level = u8::try_from(over_black).unwrap_or(u8::MAX) >> 4;
    level * 17
}
