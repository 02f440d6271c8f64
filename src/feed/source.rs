use crate::config::SourceDescriptor;
use crate::feed::device::LiveDeviceFeed;
use crate::feed::file::FileFeed;
use crate::foundation::core::{Frame, Resolution};
use crate::foundation::error::{StitchError, StitchResult};

/// A source of frames pulled one at a time by the pipeline.
///
/// `has_next` grabs, `next_frame` retrieves: `next_frame` is only valid after `has_next`
/// returned `true`, and yields exactly the frame that was grabbed.
pub trait FrameSource: Send {
    /// Human-readable identity for logs.
    fn describe(&self) -> String;

    /// Whether the source can be opened and produces frames. Does not consume the stream.
    fn probe(&mut self) -> StitchResult<bool>;

    /// Grab the next frame; `false` once the source is exhausted.
    fn has_next(&mut self) -> StitchResult<bool>;

    /// Retrieve the frame grabbed by the last successful `has_next`.
    fn next_frame(&mut self) -> StitchResult<Frame>;

    /// Release the underlying device, file or process. Calling it twice is harmless.
    fn close(&mut self) -> StitchResult<()>;
}

/// The closed set of concrete sources.
pub enum Feed {
    /// A capture device.
    LiveDevice(LiveDeviceFeed),
    /// A video file.
    FileBacked(FileFeed),
}

impl Feed {
    /// Build the source at position `index` of the feed set.
    pub fn from_descriptor(index: usize, desc: &SourceDescriptor) -> StitchResult<Self> {
        Ok(match desc {
            SourceDescriptor::LiveDevice {
                device,
                input_format,
                width,
                height,
                fps,
                scale_width,
            } => {
                let capture = Resolution::new(*width, *height).map_err(|_| {
                    StitchError::config(format!("source {index}: capture size must be non-zero"))
                })?;
                Self::LiveDevice(LiveDeviceFeed::new(
                    index,
                    device.clone(),
                    input_format.clone(),
                    capture,
                    *fps,
                    *scale_width,
                ))
            }
            SourceDescriptor::File { path, scale_width } => {
                Self::FileBacked(FileFeed::new(index, path.clone(), *scale_width))
            }
        })
    }

    fn inner(&mut self) -> &mut dyn FrameSource {
        match self {
            Self::LiveDevice(f) => f,
            Self::FileBacked(f) => f,
        }
    }
}

impl FrameSource for Feed {
    fn describe(&self) -> String {
        match self {
            Self::LiveDevice(f) => f.describe(),
            Self::FileBacked(f) => f.describe(),
        }
    }

    fn probe(&mut self) -> StitchResult<bool> {
        self.inner().probe()
    }

    fn has_next(&mut self) -> StitchResult<bool> {
        self.inner().has_next()
    }

    fn next_frame(&mut self) -> StitchResult<Frame> {
        self.inner().next_frame()
    }

    fn close(&mut self) -> StitchResult<()> {
        self.inner().close()
    }
}
