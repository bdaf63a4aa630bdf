use crate::foundation::core::{Canvas, FittedBounds};

/// Fit a source image into the surface, centered, scaled by `scale_factor`.
///
/// The image is width-bound when it is proportionally wider than the
/// surface, otherwise height-bound; the other dimension follows from the
/// source aspect ratio. An optional `max_dimension` uniformly downscales
/// the result so neither side exceeds `max_dimension * 1.5` (thumbnail
/// renders analyze far fewer pixels that way).
pub(crate) fn fit_image(
    image_w: u32,
    image_h: u32,
    canvas: Canvas,
    scale_factor: f64,
    max_dimension: Option<u32>,
) -> FittedBounds {
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return FittedBounds::empty();
    }

    let aspect = f64::from(image_w) / f64::from(image_h);
    let (mut width, mut height) = if aspect > canvas.aspect() {
        let w = f64::from(canvas.width) * scale_factor;
        (w, w / aspect)
    } else {
        let h = f64::from(canvas.height) * scale_factor;
        (h * aspect, h)
    };

    if let Some(max) = max_dimension {
        let cap = f64::from(max) * 1.5;
        let scale = (cap / width.max(height)).min(1.0);
        width *= scale;
        height *= scale;
    }

    FittedBounds {
        offset_x: (f64::from(canvas.width) - width) / 2.0,
        offset_y: (f64::from(canvas.height) - height) / 2.0,
        width,
        height,
    }
}
