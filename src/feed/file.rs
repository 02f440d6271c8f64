use std::path::PathBuf;

use crate::feed::ffmpeg::{DecodeInput, LookAhead, probe_video_size};
use crate::feed::source::FrameSource;
use crate::foundation::core::{Frame, Resolution};
use crate::foundation::error::StitchResult;

/// A video file decoded front to back once.
pub struct FileFeed {
    path: PathBuf,
    size: Option<Resolution>,
    stream: LookAhead,
}

impl FileFeed {
    /// Describe a file; nothing is opened until `probe` or `has_next`.
    pub fn new(index: usize, path: PathBuf, scale_width: Option<u32>) -> Self {
        Self {
            path,
            size: None,
            stream: LookAhead::new(index, scale_width),
        }
    }

    /// Decoded frame size, once probed.
    pub fn size(&self) -> Option<Resolution> {
        self.size
    }
}

impl FrameSource for FileFeed {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn probe(&mut self) -> StitchResult<bool> {
        if !self.path.is_file() {
            tracing::warn!(path = %self.path.display(), "source file does not exist");
            return Ok(false);
        }
        match probe_video_size(&self.path) {
            Ok(size) => {
                tracing::debug!(path = %self.path.display(), %size, "probed source file");
                self.size = Some(size);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "source file is not readable video");
                Ok(false)
            }
        }
    }

    fn has_next(&mut self) -> StitchResult<bool> {
        let path = &self.path;
        let size = &mut self.size;
        self.stream.has_next(|| {
            let probed = match *size {
                Some(s) => s,
                None => probe_video_size(path)?,
            };
            *size = Some(probed);
            Ok(DecodeInput {
                args: vec!["-i".into(), path.as_os_str().to_owned()],
                size: probed,
            })
        })
    }

    fn next_frame(&mut self) -> StitchResult<Frame> {
        self.stream.take()
    }

    fn close(&mut self) -> StitchResult<()> {
        self.stream.close()
    }
}
