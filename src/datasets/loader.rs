use anyhow::Context;
use image::RgbImage;
use std::path::Path;

/// How an image file becomes an RGB pixel grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageLoader {
    /// `image::open`, format from the file extension.
    #[default]
    File,
    /// Read the whole file into memory, then decode with the format guessed
    /// from its content.
    InMemory,
}

impl ImageLoader {
    pub fn load(&self, path: &Path) -> anyhow::Result<RgbImage> {
        let img = match self {
            ImageLoader::File => image::open(path)
                .with_context(|| format!("failed to decode image {}", path.display()))?,
            ImageLoader::InMemory => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                image::load_from_memory(&bytes)
                    .with_context(|| format!("failed to decode image {}", path.display()))?
            }
        };
        Ok(img.to_rgb8())
    }
}
