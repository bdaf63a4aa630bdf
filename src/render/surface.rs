use kurbo::Point;

use crate::engine::options::ColorMode;
use crate::foundation::core::{Canvas, FittedBounds};
use crate::foundation::error::{ScrawlError, ScrawlResult};

/// A readback of the surface as RGBA8 pixels.
///
/// Pixels are **premultiplied alpha**; the flag makes this explicit at API
/// boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// One stroke emitted by the step engine: a single straight segment in
/// surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSegment {
    /// Segment start in surface coordinates.
    pub from: Point,
    /// Segment end in surface coordinates.
    pub to: Point,
    /// Straight-alpha ink color.
    pub rgb: [u8; 3],
    /// Stroke opacity in `[0, 1]` (clamped at rasterization).
    pub alpha: f32,
    /// Stroke width in surface pixels.
    pub width: f64,
}

/// Owns the drawable raster surface and turns queued stroke segments into
/// pixels.
///
/// Strokes accumulate in a pending queue; [`Surface::flush`] rasterizes the
/// batch into a scratch pixmap via `vello_cpu` and composites it over the
/// persistent surface with premultiplied src-over. Compositing is
/// associative, so flush cadence never changes the final image beyond
/// 8-bit rounding.
pub struct Surface {
    canvas: Canvas,
    pixmap: vello_cpu::Pixmap,
    scratch: vello_cpu::Pixmap,
    ctx: vello_cpu::RenderContext,
    pending: Vec<StrokeSegment>,
    strokes_drawn: u64,
}

impl Surface {
    /// Allocate a surface for the given canvas dimensions.
    pub fn new(canvas: Canvas) -> ScrawlResult<Self> {
        let w: u16 = canvas
            .width
            .try_into()
            .map_err(|_| ScrawlError::render(format!("surface width exceeds u16: {}", canvas.width)))?;
        let h: u16 = canvas.height.try_into().map_err(|_| {
            ScrawlError::render(format!("surface height exceeds u16: {}", canvas.height))
        })?;
        Ok(Self {
            canvas,
            pixmap: vello_cpu::Pixmap::new(w, h),
            scratch: vello_cpu::Pixmap::new(w, h),
            ctx: vello_cpu::RenderContext::new(w, h),
            pending: Vec::new(),
            strokes_drawn: 0,
        })
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Reset the surface for a fresh drawing run: drop any queued strokes
    /// and lay down the background (transparent, or white; black when the
    /// mode is `Invert`).
    pub(crate) fn begin(&mut self, mode: ColorMode, transparent: bool) {
        self.pending.clear();
        self.strokes_drawn = 0;
        if transparent {
            clear_pixmap(&mut self.pixmap, [0, 0, 0, 0]);
        } else if mode == ColorMode::Invert {
            clear_pixmap(&mut self.pixmap, [0, 0, 0, 255]);
        } else {
            clear_pixmap(&mut self.pixmap, [255, 255, 255, 255]);
        }
    }

    /// Queue one stroke segment for the next flush.
    pub(crate) fn queue(&mut self, segment: StrokeSegment) {
        self.pending.push(segment);
        self.strokes_drawn += 1;
    }

    /// Number of strokes queued but not yet rasterized.
    pub fn pending_strokes(&self) -> usize {
        self.pending.len()
    }

    /// Total strokes queued since the surface was last reset for a run.
    pub fn strokes_drawn(&self) -> u64 {
        self.strokes_drawn
    }

    /// Rasterize all pending strokes onto the surface.
    pub fn flush(&mut self) -> ScrawlResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        self.ctx.reset();
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        for seg in &self.pending {
            let alpha = (seg.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
            self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                seg.rgb[0], seg.rgb[1], seg.rgb[2], alpha,
            ));
            self.ctx.fill_path(&segment_quad(seg));
        }
        self.ctx.flush();

        clear_pixmap(&mut self.scratch, [0, 0, 0, 0]);
        self.ctx.render_to_pixmap(&mut self.scratch);
        premul_over_in_place(
            self.pixmap.data_as_u8_slice_mut(),
            self.scratch.data_as_u8_slice(),
        )?;
        self.pending.clear();
        Ok(())
    }

    /// Read back the whole surface.
    pub fn frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    /// Read back just the fitted image region, the shape consumers persist
    /// or upload. Degenerate bounds yield an empty frame.
    pub fn crop(&self, bounds: &FittedBounds) -> FrameRGBA {
        let (x0, y0, w, h) = bounds.pixel_rect(self.canvas);
        let mut data = Vec::with_capacity(w as usize * h as usize * 4);
        let src = self.pixmap.data_as_u8_slice();
        let stride = self.canvas.width as usize * 4;
        for row in y0..y0 + h {
            let start = row as usize * stride + x0 as usize * 4;
            data.extend_from_slice(&src[start..start + w as usize * 4]);
        }
        FrameRGBA {
            width: w,
            height: h,
            data,
            premultiplied: true,
        }
    }
}

/// Expand a segment into its filled quad. Butt caps; at hairline widths
/// round caps would read as blobs.
fn segment_quad(seg: &StrokeSegment) -> vello_cpu::kurbo::BezPath {
    let dx = seg.to.x - seg.from.x;
    let dy = seg.to.y - seg.from.y;
    let len = dx.hypot(dy);
    let half = seg.width / 2.0;
    let (nx, ny) = if len > 0.0 {
        (-dy / len * half, dx / len * half)
    } else {
        (half, 0.0)
    };

    let mut path = vello_cpu::kurbo::BezPath::new();
    path.move_to((seg.from.x + nx, seg.from.y + ny));
    path.line_to((seg.to.x + nx, seg.to.y + ny));
    path.line_to((seg.to.x - nx, seg.to.y - ny));
    path.line_to((seg.from.x - nx, seg.from.y - ny));
    path.close_path();
    path
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> ScrawlResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ScrawlError::render(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        d[3] = (s[3]).saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = s[c].saturating_add(dc);
        }
    }
    Ok(())
}

fn mul_div255_u8(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(w: u32, h: u32) -> Surface {
        Surface::new(Canvas::new(w, h).unwrap()).unwrap()
    }

    fn segment(x0: f64, y0: f64, x1: f64, y1: f64, alpha: f32) -> StrokeSegment {
        StrokeSegment {
            from: Point::new(x0, y0),
            to: Point::new(x1, y1),
            rgb: [0, 0, 0],
            alpha,
            width: 2.0,
        }
    }

    #[test]
    fn begin_fills_background_per_mode() {
        let mut s = surface(2, 2);
        s.begin(ColorMode::Bw, false);
        assert_eq!(&s.frame().data[0..4], &[255, 255, 255, 255]);

        s.begin(ColorMode::Invert, false);
        assert_eq!(&s.frame().data[0..4], &[0, 0, 0, 255]);

        s.begin(ColorMode::Bw, true);
        assert_eq!(&s.frame().data[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn flush_leaves_ink_on_the_surface() {
        let mut s = surface(8, 8);
        s.begin(ColorMode::Bw, false);
        s.queue(segment(1.0, 4.0, 7.0, 4.0, 1.0));
        assert_eq!(s.pending_strokes(), 1);
        s.flush().unwrap();
        assert_eq!(s.pending_strokes(), 0);
        assert_eq!(s.strokes_drawn(), 1);

        let frame = s.frame();
        let inked = frame
            .data
            .chunks_exact(4)
            .filter(|px| px[0] < 250)
            .count();
        assert!(inked > 0, "opaque stroke must darken pixels");
    }

    #[test]
    fn flush_without_pending_is_a_no_op() {
        let mut s = surface(4, 4);
        s.begin(ColorMode::Bw, false);
        let before = s.frame();
        s.flush().unwrap();
        assert_eq!(s.frame(), before);
    }

    #[test]
    fn begin_resets_counters() {
        let mut s = surface(4, 4);
        s.begin(ColorMode::Bw, false);
        s.queue(segment(0.0, 0.0, 3.0, 3.0, 1.0));
        s.begin(ColorMode::Bw, false);
        assert_eq!(s.pending_strokes(), 0);
        assert_eq!(s.strokes_drawn(), 0);
    }

    #[test]
    fn crop_extracts_the_fitted_region() {
        let mut s = surface(10, 10);
        s.begin(ColorMode::Bw, false);
        let bounds = FittedBounds {
            offset_x: 2.0,
            offset_y: 3.0,
            width: 4.0,
            height: 5.0,
        };
        let frame = s.crop(&bounds);
        assert_eq!((frame.width, frame.height), (4, 5));
        assert_eq!(frame.data.len(), 4 * 5 * 4);
        assert!(frame.data.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
    }

    #[test]
    fn crop_of_empty_bounds_is_empty() {
        let s = surface(10, 10);
        let frame = s.crop(&FittedBounds::empty());
        assert_eq!((frame.width, frame.height), (0, 0));
        assert!(frame.data.is_empty());
    }
}
