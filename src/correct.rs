//! Per-frame lens correction applied to raw frames before stitching.

use rayon::prelude::*;

use crate::config::CorrectionConfig;
use crate::foundation::core::{CHANNELS, Frame};
use crate::foundation::math::sample_bilinear_rgb8;

/// A pure frame-to-frame correction (lens distortion, color, ...).
pub trait Corrector: Send + Sync {
    /// Corrected copy of `frame`, same size and tag.
    fn correct(&self, frame: &Frame) -> Frame;
}

/// Undistortion for the two-term radial lens model.
///
/// Each output pixel `(u, v)` is normalized through the camera matrix, pushed through
/// `1 + k1 r² + k2 r⁴`, and sampled bilinearly from the input. Samples falling outside the input
/// are black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadialCorrector {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    k1: f64,
    k2: f64,
}

impl RadialCorrector {
    /// Build from camera intrinsics and radial coefficients.
    pub fn new(cfg: &CorrectionConfig) -> Self {
        Self {
            fx: cfg.fx,
            fy: cfg.fy,
            cx: cfg.cx,
            cy: cfg.cy,
            k1: cfg.k1,
            k2: cfg.k2,
        }
    }

    fn distort(&self, u: f64, v: f64) -> (f64, f64) {
        let x = (u - self.cx) / self.fx;
        let y = (v - self.cy) / self.fy;
        let r2 = x * x + y * y;
        let factor = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        (x * factor * self.fx + self.cx, y * factor * self.fy + self.cy)
    }
}

impl Corrector for RadialCorrector {
    fn correct(&self, frame: &Frame) -> Frame {
        let (w, h) = (frame.width(), frame.height());
        let src = frame.data();
        let stride = w as usize * CHANNELS;
        let mut out = vec![0u8; frame.resolution().frame_len()];
        out.par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w as usize {
                    let (sx, sy) = self.distort(x as f64, y as f64);
                    if let Some(px) = sample_bilinear_rgb8(src, w, h, sx, sy) {
                        row[x * CHANNELS..(x + 1) * CHANNELS].copy_from_slice(&px);
                    }
                }
            });
        Frame::from_parts(frame.resolution(), out, frame.tag())
    }
}

#[cfg(test)]
#[path = "../tests/unit/correct.rs"]
mod tests;
