use crate::foundation::error::{ScrawlError, ScrawlResult};

/// Target surface dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Validated constructor. Both dimensions must be nonzero and fit the
    /// CPU raster backend's u16 surface limit.
    pub fn new(width: u32, height: u32) -> ScrawlResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScrawlError::validation("canvas dimensions must be > 0"));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(ScrawlError::validation(format!(
                "canvas dimensions exceed backend limit of {}: {width}x{height}",
                u16::MAX
            )));
        }
        Ok(Self { width, height })
    }

    pub(crate) fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Placement of the fitted source image inside the surface.
///
/// Offsets and sizes are fractional: the fit math centers the image with
/// sub-pixel precision, exactly as the analysis produced it. Consumers that
/// need whole pixels (cropping, spawn bounds) go through
/// [`FittedBounds::raster_size`] or the crate's crop readback.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FittedBounds {
    /// Horizontal offset of the fitted image's left edge.
    pub offset_x: f64,
    /// Vertical offset of the fitted image's top edge.
    pub offset_y: f64,
    /// Fitted image width.
    pub width: f64,
    /// Fitted image height.
    pub height: f64,
}

impl FittedBounds {
    /// An empty placement (degenerate fit; yields an empty graph).
    pub fn empty() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }

    /// Integer raster dimensions of the analyzed pixel grid.
    ///
    /// Node coordinates range over `0..w` x `0..h`.
    pub fn raster_size(&self) -> (u32, u32) {
        let w = if self.width.is_finite() && self.width > 0.0 {
            self.width.floor() as u32
        } else {
            0
        };
        let h = if self.height.is_finite() && self.height > 0.0 {
            self.height.floor() as u32
        } else {
            0
        };
        (w, h)
    }

    /// Whether the placement covers no pixels at all.
    pub fn is_empty(&self) -> bool {
        let (w, h) = self.raster_size();
        w == 0 || h == 0
    }

    /// Whole-pixel crop rectangle `(x, y, w, h)` clamped to the canvas.
    pub(crate) fn pixel_rect(&self, canvas: Canvas) -> (u32, u32, u32, u32) {
        let x0 = self.offset_x.floor().max(0.0) as u32;
        let y0 = self.offset_y.floor().max(0.0) as u32;
        let x0 = x0.min(canvas.width);
        let y0 = y0.min(canvas.height);
        let w = (self.width.round().max(0.0) as u32).min(canvas.width - x0);
        let h = (self.height.round().max(0.0) as u32).min(canvas.height - y0);
        (x0, y0, w, h)
    }
}
