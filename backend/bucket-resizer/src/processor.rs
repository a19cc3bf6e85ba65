//! Image processor - decodes, resizes to a fixed width and encodes JPEG
//!
//! Height always follows from the source aspect ratio. Resampling uses the
//! Lanczos3 filter.

use crate::config::ResizeConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, GenericImageView, ImageResult};
use std::io::{BufRead, Seek, Write};
use tracing::debug;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Width-constrained resizer
#[derive(Clone, Debug)]
pub struct ImageResizer {
    config: ResizeConfig,
}

impl ImageResizer {
    pub fn new(config: ResizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResizeConfig {
        &self.config
    }

    /// Decode an image, guessing the format from its content
    pub fn decode<R: BufRead + Seek>(&self, reader: R) -> ImageResult<DynamicImage> {
        let reader = ImageReader::new(reader).with_guessed_format()?;
        let format = reader.format();
        let img = reader.decode()?;

        debug!(
            format = ?format,
            width = img.width(),
            height = img.height(),
            "Decoded image"
        );
        Ok(img)
    }

    /// Output dimensions for a `width` x `height` source
    ///
    /// `new_height = round(height * target_width / width)`, at least 1px.
    /// With upscaling disabled, sources at or below the target width keep
    /// their dimensions.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let target_w = self.config.target_width;

        if width == 0 || height == 0 {
            return (width, height);
        }
        if !self.config.allow_upscale && width <= target_w {
            return (width, height);
        }

        let new_h = (height as f64 * target_w as f64 / width as f64).round() as u32;
        (target_w, new_h.max(1))
    }

    /// Resample to the target dimensions
    ///
    /// Always resamples, even when the dimensions are unchanged.
    pub fn resize(&self, img: &DynamicImage) -> DynamicImage {
        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = self.target_dimensions(orig_w, orig_h);

        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            "Resizing image"
        );
        img.resize_exact(new_w, new_h, FilterType::Lanczos3)
    }

    /// Encode as baseline JPEG at the configured quality
    pub fn encode_jpeg<W: Write>(&self, img: &DynamicImage, writer: &mut W) -> ImageResult<()> {
        let rgb = img.to_rgb8();
        let mut encoder = JpegEncoder::new_with_quality(writer, self.config.jpeg_quality);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
    }
}
