//! Downstream consumers of composites: recorder, encoder pipe and preview, plus the
//! [`fanout::FanOut`] that feeds them.

pub mod fanout;
pub mod ffmpeg;
pub mod preview;

use crate::foundation::core::{Fps, Frame, Resolution};
use crate::foundation::error::{StitchError, StitchResult};

/// Configuration provided to a [`FrameSink`] when it is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Size of every frame that will be pushed.
    pub resolution: Resolution,
    /// Frame rate announced to the consumer.
    pub fps: Fps,
}

/// Sink contract for consuming composites in delivery order.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> StitchResult<()>;
    /// Push one frame of the size announced in `begin`. May block (backpressure).
    fn push_frame(&mut self, frame: &Frame) -> StitchResult<()>;
    /// Flush and release. Called at most once, after `begin` succeeded.
    fn end(&mut self) -> StitchResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<Frame>,
    ended: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in delivery order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Whether `end` has been called.
    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> StitchResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> StitchResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| StitchError::sink("in-memory sink not started"))?;
        if frame.resolution() != cfg.resolution {
            return Err(StitchError::validation(format!(
                "frame size mismatch: got {}, expected {}",
                frame.resolution(),
                cfg.resolution
            )));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> StitchResult<()> {
        self.ended = true;
        Ok(())
    }
}
