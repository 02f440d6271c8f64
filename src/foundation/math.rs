use crate::foundation::core::CHANNELS;

/// Bilinearly sample an RGB8 buffer at fractional `(x, y)`.
///
/// Returns `None` when the point lies outside `[0, width - 1] x [0, height - 1]`. Integral
/// coordinates return the stored pixel exactly.
pub(crate) fn sample_bilinear_rgb8(
    data: &[u8],
    width: u32,
    height: u32,
    x: f64,
    y: f64,
) -> Option<[u8; 3]> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);
    if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
        return None;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width as usize - 1);
    let y1 = (y0 + 1).min(height as usize - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let stride = width as usize * CHANNELS;
    let p00 = y0 * stride + x0 * CHANNELS;
    let p10 = y0 * stride + x1 * CHANNELS;
    let p01 = y1 * stride + x0 * CHANNELS;
    let p11 = y1 * stride + x1 * CHANNELS;

    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let top = lerp(f64::from(data[p00 + c]), f64::from(data[p10 + c]), fx);
        let bottom = lerp(f64::from(data[p01 + c]), f64::from(data[p11 + c]), fx);
        *o = lerp(top, bottom, fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
