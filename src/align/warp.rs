use rayon::prelude::*;

use crate::align::homography::Homography;
use crate::foundation::core::{CHANNELS, Frame, Resolution, SourceTag};
use crate::foundation::math::sample_bilinear_rgb8;

/// Placement of both frames on a shared canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CanvasLayout {
    /// Canvas size.
    pub(crate) size: Resolution,
    /// Offset of the reference frame's origin on the canvas.
    pub(crate) offset: (u32, u32),
}

/// Why a composite could not be laid out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LayoutError {
    /// A corner of the incoming frame maps to infinity.
    CornerAtInfinity,
    /// The union box exceeds the configured maximum area.
    TooLarge { area: u64, max: u64 },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CornerAtInfinity => write!(f, "incoming frame corner projects to infinity"),
            Self::TooLarge { area, max } => {
                write!(f, "composite canvas of {area} px exceeds limit of {max} px")
            }
        }
    }
}

/// Union bounding box of the reference rectangle and the warped incoming rectangle.
pub(crate) fn canvas_layout(
    reference: Resolution,
    incoming: Resolution,
    h: &Homography,
    max_pixels: u64,
) -> Result<CanvasLayout, LayoutError> {
    let (iw, ih) = (f64::from(incoming.width), f64::from(incoming.height));
    let mut min_x = 0.0f64;
    let mut min_y = 0.0f64;
    let mut max_x = f64::from(reference.width);
    let mut max_y = f64::from(reference.height);
    for (x, y) in [(0.0, 0.0), (iw, 0.0), (0.0, ih), (iw, ih)] {
        let (px, py) = h.project(x, y).ok_or(LayoutError::CornerAtInfinity)?;
        min_x = min_x.min(px);
        min_y = min_y.min(py);
        max_x = max_x.max(px);
        max_y = max_y.max(py);
    }

    let (x0, y0) = (min_x.floor(), min_y.floor());
    let (cw, ch) = (max_x.ceil() - x0, max_y.ceil() - y0);
    let area = cw * ch;
    if !area.is_finite() || area > max_pixels as f64 || cw > f64::from(u32::MAX) {
        return Err(LayoutError::TooLarge {
            area: if area.is_finite() { area as u64 } else { u64::MAX },
            max: max_pixels,
        });
    }

    Ok(CanvasLayout {
        size: Resolution {
            width: cw as u32,
            height: ch as u32,
        },
        offset: ((-x0) as u32, (-y0) as u32),
    })
}

/// Warp `incoming` onto a canvas through `translation ∘ h`, then paste `reference` unwarped at
/// the translation offset. The reference wins wherever both overlap.
pub(crate) fn composite_pair(
    reference: &Frame,
    incoming: &Frame,
    h: &Homography,
    max_pixels: u64,
) -> Result<Frame, LayoutError> {
    let layout = canvas_layout(reference.resolution(), incoming.resolution(), h, max_pixels)?;
    let (ox, oy) = layout.offset;
    let to_canvas = h.then(&Homography::translation(f64::from(ox), f64::from(oy)));
    // `canvas_layout` already proved every corner projects finitely, so a missing inverse means
    // the homography itself is degenerate.
    let from_canvas = to_canvas.inverse().ok_or(LayoutError::CornerAtInfinity)?;

    let cw = layout.size.width as usize;
    let stride = cw * CHANNELS;
    let mut canvas = vec![0u8; layout.size.frame_len()];

    let (iw, ih, idata) = (incoming.width(), incoming.height(), incoming.data());
    canvas
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..cw {
                let Some((sx, sy)) = from_canvas.project(x as f64, y as f64) else {
                    continue;
                };
                if let Some(px) = sample_bilinear_rgb8(idata, iw, ih, sx, sy) {
                    row[x * CHANNELS..(x + 1) * CHANNELS].copy_from_slice(&px);
                }
            }
        });

    let rw = reference.width() as usize * CHANNELS;
    for (ry, src_row) in reference.data().chunks_exact(rw).enumerate() {
        let start = (oy as usize + ry) * stride + ox as usize * CHANNELS;
        canvas[start..start + rw].copy_from_slice(src_row);
    }

    Ok(Frame::from_parts(layout.size, canvas, SourceTag::Composite))
}

#[cfg(test)]
#[path = "../../tests/unit/align/warp.rs"]
mod tests;
