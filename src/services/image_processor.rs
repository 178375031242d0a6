// src/services/image_processor.rs
use crate::errors::SolaError;
use image::ImageFormat as ImgFormat;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Sniffs the magic bytes and returns the canonical MIME type. Only PNG,
    /// JPEG and WebP pass, whatever the client declared.
    pub fn sniff_mime(&self, data: &[u8]) -> Result<&'static str, SolaError> {
        let format = image::guess_format(data).map_err(|_| SolaError::InvalidFileType)?;

        match format {
            ImgFormat::Png => Ok("image/png"),
            ImgFormat::Jpeg => Ok("image/jpeg"),
            ImgFormat::WebP => Ok("image/webp"),
            _ => Err(SolaError::InvalidFileType),
        }
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}
