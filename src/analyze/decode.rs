use anyhow::Context;

use crate::foundation::error::{ScrawlError, ScrawlResult};

/// A decoded source image with straight (non-premultiplied) RGBA8 pixels.
///
/// The analyzer reads straight alpha: a pixel participates in the sketch
/// only when its alpha exceeds 128, and brightness is computed from the
/// unmultiplied channels.
#[derive(Clone, Debug)]
pub struct SourceImage {
    rgba: image::RgbaImage,
}

impl SourceImage {
    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    ///
    /// Fails fast on undecodable bytes; no partial analysis is attempted.
    pub fn decode(bytes: &[u8]) -> ScrawlResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        Self::from_rgba(dyn_img.to_rgba8())
    }

    /// Wrap an already-decoded RGBA buffer.
    pub fn from_rgba(rgba: image::RgbaImage) -> ScrawlResult<Self> {
        let (w, h) = rgba.dimensions();
        if w == 0 || h == 0 {
            return Err(ScrawlError::validation("source image has zero dimension"));
        }
        Ok(Self { rgba })
    }

    /// Source width in pixels.
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    /// Source height in pixels.
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    /// Resample to the fitted raster size. Identity-sized requests return
    /// the pixels untouched so re-analysis stays bit-exact.
    pub(crate) fn resize_to(&self, width: u32, height: u32) -> image::RgbaImage {
        if (width, height) == self.rgba.dimensions() {
            return self.rgba.clone();
        }
        image::imageops::resize(&self.rgba, width, height, image::imageops::FilterType::Triangle)
    }
}
