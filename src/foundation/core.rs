use crate::foundation::error::{StitchError, StitchResult};

/// Bytes per pixel of every [`Frame`] (interleaved RGB8).
pub const CHANNELS: usize = 3;

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> StitchResult<Self> {
        if den == 0 {
            return Err(StitchError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StitchError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Format as the `num/den` rate string understood by `ffmpeg -r`.
    pub fn as_rate_arg(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> StitchResult<Self> {
        if width == 0 || height == 0 {
            return Err(StitchError::validation("resolution must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Byte length of one RGB8 frame at this resolution.
    pub fn frame_len(self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }

    /// Round both dimensions down to even values (minimum 2), as required by yuv420p encoders.
    pub fn even(self) -> Self {
        Self {
            width: (self.width & !1).max(2),
            height: (self.height & !1).max(2),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Logical origin of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// Raw frame from the source at this position in the feed set.
    Feed(usize),
    /// Result of merging two or more frames.
    Composite,
}

/// An immutable RGB8 frame.
///
/// Pixels are interleaved RGB, tightly packed, row-major. Every transformation (compositing,
/// resizing, correction) returns a new frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    tag: SourceTag,
}

impl Frame {
    /// Wrap `data` as a frame, validating its length against `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>, tag: SourceTag) -> StitchResult<Self> {
        if width == 0 || height == 0 {
            return Err(StitchError::validation("frame width/height must be non-zero"));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(StitchError::validation(format!(
                "frame data size mismatch: got {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            tag,
        })
    }

    /// Crate-internal constructor for buffers whose size is correct by construction.
    pub(crate) fn from_parts(size: Resolution, data: Vec<u8>, tag: SourceTag) -> Self {
        debug_assert_eq!(data.len(), size.frame_len());
        Self {
            width: size.width,
            height: size.height,
            data,
            tag,
        }
    }

    /// A frame where every pixel is `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], tag: SourceTag) -> StitchResult<Self> {
        let data = rgb.repeat(width as usize * height as usize);
        Self::new(width, height, data, tag)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame dimensions.
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    /// Logical origin of this frame.
    pub fn tag(&self) -> SourceTag {
        self.tag
    }

    /// Raw RGB8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame, returning its RGB8 bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Same pixels under a different tag.
    pub fn with_tag(mut self, tag: SourceTag) -> Self {
        self.tag = tag;
        self
    }

    /// Pixel at `(x, y)`; `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([self.data[off], self.data[off + 1], self.data[off + 2]])
    }

    /// Resample to `target` with a triangle (bilinear) filter. Returns a clone when the size
    /// already matches.
    pub fn resize(&self, target: Resolution) -> Frame {
        if target == self.resolution() {
            return self.clone();
        }
        let resized = image::imageops::resize(
            &self.to_rgb_image(),
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        );
        Frame::from_parts(target, resized.into_raw(), self.tag)
    }

    /// Resample to `width`, keeping the aspect ratio.
    pub fn resize_to_width(&self, width: u32) -> Frame {
        let width = width.max(1);
        let height = ((f64::from(self.height) * f64::from(width) / f64::from(self.width)).round()
            as u32)
            .max(1);
        self.resize(Resolution { width, height })
    }

    /// Copy into an [`image::RgbImage`].
    pub fn to_rgb_image(&self) -> image::RgbImage {
        // Length was validated in `new`, so `from_raw` cannot fail here.
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| image::RgbImage::new(self.width, self.height))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
