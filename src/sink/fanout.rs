use crate::foundation::core::{Fps, Frame, Resolution};
use crate::foundation::error::{StitchError, StitchResult};
use crate::sink::preview::{Preview, PreviewKey};
use crate::sink::{FrameSink, SinkConfig};

/// Outcome of one delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The sink is not configured, or was disabled earlier in the run.
    Disabled,
    /// The frame was handed over.
    Delivered,
    /// The sink rejected the frame.
    Failed(String),
}

/// Per-sink results of one [`FanOut::dispatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    /// Preview delivery.
    pub preview: DeliveryStatus,
    /// Recorder delivery.
    pub record: DeliveryStatus,
    /// Encoder pipe delivery.
    pub stream: DeliveryStatus,
    /// The preview asked to stop.
    pub quit_requested: bool,
}

impl DispatchReport {
    /// Whether any delivery failed.
    pub fn has_failures(&self) -> bool {
        [&self.preview, &self.record, &self.stream]
            .iter()
            .any(|s| matches!(s, DeliveryStatus::Failed(_)))
    }
}

struct SinkSlot {
    sink: Box<dyn FrameSink>,
    begun: bool,
}

/// Delivers each composite to the preview, the recorder and the encoder pipe, in that order.
///
/// A failure in one delivery never prevents the others. The recorder opens lazily on the first
/// composite and keeps failing frames in place; the encoder pipe opens in `start` and is dropped
/// for the rest of the run on its first failure.
pub struct FanOut {
    output: Option<Resolution>,
    fps: Fps,
    preview: Option<Box<dyn Preview>>,
    record: Option<SinkSlot>,
    stream: Option<SinkSlot>,
}

impl FanOut {
    /// `output` fixes the delivered size; `None` infers it from the first composite.
    pub fn new(output: Option<Resolution>, fps: Fps) -> Self {
        Self {
            output,
            fps,
            preview: None,
            record: None,
            stream: None,
        }
    }

    /// Attach a preview surface.
    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Attach a recorder, opened on the first dispatch.
    pub fn with_recorder(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.record = Some(SinkSlot { sink, begun: false });
        self
    }

    /// Attach an encoder pipe, opened by [`FanOut::start`].
    pub fn with_stream(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.stream = Some(SinkSlot { sink, begun: false });
        self
    }

    /// Delivered frame size, once known.
    pub fn output(&self) -> Option<Resolution> {
        self.output
    }

    /// Whether the encoder pipe is still attached.
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the encoder pipe. Its descriptor is fixed for the whole run, so the output size must
    /// be configured.
    pub fn start(&mut self) -> StitchResult<()> {
        let Some(slot) = self.stream.as_mut() else {
            return Ok(());
        };
        let resolution = self
            .output
            .ok_or_else(|| StitchError::config("streaming requires a configured output size"))?;
        slot.sink.begin(SinkConfig {
            resolution,
            fps: self.fps,
        })?;
        slot.begun = true;
        Ok(())
    }

    /// Deliver one composite to every enabled sink.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn dispatch(&mut self, composite: &Frame) -> DispatchReport {
        let target = *self
            .output
            .get_or_insert_with(|| composite.resolution().even());
        let frame = composite.resize(target);
        let cfg = SinkConfig {
            resolution: target,
            fps: self.fps,
        };

        let mut quit_requested = false;
        let preview = match self.preview.as_mut() {
            None => DeliveryStatus::Disabled,
            Some(p) => match p.present(&frame) {
                Ok(key) => {
                    quit_requested = key == PreviewKey::Quit;
                    DeliveryStatus::Delivered
                }
                Err(e) => {
                    tracing::warn!(error = %e, "preview failed");
                    DeliveryStatus::Failed(e.to_string())
                }
            },
        };

        let record = match self.record.as_mut() {
            None => DeliveryStatus::Disabled,
            Some(slot) if !slot.begun => match slot.sink.begin(cfg) {
                Ok(()) => {
                    slot.begun = true;
                    deliver(slot, &frame, "recorder")
                }
                Err(e) => {
                    tracing::error!(error = %e, "recorder failed to open, recording disabled");
                    self.record = None;
                    DeliveryStatus::Failed(e.to_string())
                }
            },
            Some(slot) => deliver(slot, &frame, "recorder"),
        };

        let stream = match self.stream.as_mut() {
            None => DeliveryStatus::Disabled,
            Some(slot) => {
                let status = deliver(slot, &frame, "encoder pipe");
                if matches!(status, DeliveryStatus::Failed(_)) {
                    tracing::error!("encoder pipe failed, streaming disabled for the rest of the run");
                    if let Some(slot) = self.stream.take() {
                        finish_slot(slot, "encoder pipe");
                    }
                }
                status
            }
        };

        DispatchReport {
            preview,
            record,
            stream,
            quit_requested,
        }
    }

    /// Tear down the preview. Idempotent.
    pub fn close_preview(&mut self) -> StitchResult<()> {
        match self.preview.take() {
            Some(mut p) => p.close(),
            None => Ok(()),
        }
    }

    /// Finalize the recorder if it was opened. Idempotent.
    pub fn finish_record(&mut self) -> StitchResult<()> {
        match self.record.take() {
            Some(mut slot) if slot.begun => slot.sink.end(),
            _ => Ok(()),
        }
    }

    /// Flush and close the encoder pipe if it is still attached. Idempotent.
    pub fn finish_stream(&mut self) -> StitchResult<()> {
        match self.stream.take() {
            Some(mut slot) if slot.begun => slot.sink.end(),
            _ => Ok(()),
        }
    }
}

fn deliver(slot: &mut SinkSlot, frame: &Frame, label: &str) -> DeliveryStatus {
    match slot.sink.push_frame(frame) {
        Ok(()) => DeliveryStatus::Delivered,
        Err(e) => {
            if e.is_broken_pipe() {
                tracing::warn!(sink = label, "consumer closed the pipe");
            } else {
                tracing::warn!(sink = label, error = %e, "delivery failed");
            }
            DeliveryStatus::Failed(e.to_string())
        }
    }
}

fn finish_slot(mut slot: SinkSlot, label: &str) {
    if !slot.begun {
        return;
    }
    if let Err(e) = slot.sink.end() {
        tracing::warn!(sink = label, error = %e, "sink did not shut down cleanly");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sink/fanout.rs"]
mod tests;
