use std::ffi::OsString;

use crate::feed::ffmpeg::{DecodeInput, LookAhead, grab_one};
use crate::feed::source::FrameSource;
use crate::foundation::core::{Frame, Resolution};
use crate::foundation::error::StitchResult;

/// A capture device read through an `ffmpeg` input format.
pub struct LiveDeviceFeed {
    device: String,
    input_format: String,
    input: DecodeInput,
    stream: LookAhead,
}

impl LiveDeviceFeed {
    /// Describe a device; nothing is opened until `probe` or `has_next`.
    pub fn new(
        index: usize,
        device: String,
        input_format: String,
        capture: Resolution,
        fps: u32,
        scale_width: Option<u32>,
    ) -> Self {
        let input = DecodeInput {
            args: [
                "-f",
                input_format.as_str(),
                "-framerate",
                fps.to_string().as_str(),
                "-video_size",
                capture.to_string().as_str(),
                "-i",
                device.as_str(),
            ]
            .map(OsString::from)
            .to_vec(),
            size: capture,
        };
        Self {
            device,
            input_format,
            input,
            stream: LookAhead::new(index, scale_width),
        }
    }
}

impl FrameSource for LiveDeviceFeed {
    fn describe(&self) -> String {
        format!("{} device {}", self.input_format, self.device)
    }

    fn probe(&mut self) -> StitchResult<bool> {
        let ok = grab_one(&self.input)?.is_some();
        if !ok {
            tracing::warn!(device = %self.device, "device produced no frame");
        }
        Ok(ok)
    }

    fn has_next(&mut self) -> StitchResult<bool> {
        self.stream.has_next(|| Ok(self.input.clone()))
    }

    fn next_frame(&mut self) -> StitchResult<Frame> {
        self.stream.take()
    }

    fn close(&mut self) -> StitchResult<()> {
        self.stream.close()
    }
}
