use std::sync::{Arc, Mutex};

use super::*;
use crate::foundation::core::SourceTag;
use crate::sink::InMemorySink;

/// Shares an [`InMemorySink`] with the test after the fan-out takes ownership.
#[derive(Clone, Default)]
struct Shared(Arc<Mutex<InMemorySink>>);

impl FrameSink for Shared {
    fn begin(&mut self, cfg: SinkConfig) -> StitchResult<()> {
        self.0.lock().unwrap().begin(cfg)
    }
    fn push_frame(&mut self, frame: &Frame) -> StitchResult<()> {
        self.0.lock().unwrap().push_frame(frame)
    }
    fn end(&mut self) -> StitchResult<()> {
        self.0.lock().unwrap().end()
    }
}

/// Fails every push once `fail_from` frames were accepted.
struct Flaky {
    accepted: usize,
    fail_from: usize,
    ends: Arc<Mutex<usize>>,
}

impl FrameSink for Flaky {
    fn begin(&mut self, _cfg: SinkConfig) -> StitchResult<()> {
        Ok(())
    }
    fn push_frame(&mut self, _frame: &Frame) -> StitchResult<()> {
        if self.accepted >= self.fail_from {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        self.accepted += 1;
        Ok(())
    }
    fn end(&mut self) -> StitchResult<()> {
        *self.ends.lock().unwrap() += 1;
        Ok(())
    }
}

struct RefusesToOpen;

impl FrameSink for RefusesToOpen {
    fn begin(&mut self, _cfg: SinkConfig) -> StitchResult<()> {
        Err(StitchError::sink("disk full"))
    }
    fn push_frame(&mut self, _frame: &Frame) -> StitchResult<()> {
        unreachable!("never opened")
    }
    fn end(&mut self) -> StitchResult<()> {
        unreachable!("never opened")
    }
}

#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<Resolution>>>);

impl Preview for Screen {
    fn present(&mut self, frame: &Frame) -> StitchResult<PreviewKey> {
        let mut shown = self.0.lock().unwrap();
        shown.push(frame.resolution());
        Ok(if shown.len() >= 3 {
            PreviewKey::Quit
        } else {
            PreviewKey::Continue
        })
    }
    fn close(&mut self) -> StitchResult<()> {
        Ok(())
    }
}

fn fps() -> Fps {
    Fps::new(20, 1).unwrap()
}

fn composite(w: u32, h: u32) -> Frame {
    Frame::filled(w, h, [40, 50, 60], SourceTag::Composite).unwrap()
}

#[test]
fn nothing_attached_reports_all_disabled() {
    let mut fan = FanOut::new(None, fps());
    fan.start().unwrap();
    let report = fan.dispatch(&composite(8, 4));
    assert_eq!(report.preview, DeliveryStatus::Disabled);
    assert_eq!(report.record, DeliveryStatus::Disabled);
    assert_eq!(report.stream, DeliveryStatus::Disabled);
    assert!(!report.has_failures());
}

#[test]
fn recorder_opens_lazily_with_inferred_even_size() {
    let rec = Shared::default();
    let mut fan = FanOut::new(None, fps()).with_recorder(Box::new(rec.clone()));
    fan.start().unwrap();
    assert!(rec.0.lock().unwrap().config().is_none());

    let report = fan.dispatch(&composite(9, 5));
    assert_eq!(report.record, DeliveryStatus::Delivered);
    let expected = Resolution::new(8, 4).unwrap();
    assert_eq!(fan.output(), Some(expected));
    assert_eq!(rec.0.lock().unwrap().config().unwrap().resolution, expected);

    // Later composites of another size are resized to the first one's.
    fan.dispatch(&composite(20, 6));
    let sink = rec.0.lock().unwrap();
    assert_eq!(sink.frames().len(), 2);
    assert!(sink.frames().iter().all(|f| f.resolution() == expected));
}

#[test]
fn configured_output_size_is_used() {
    let rec = Shared::default();
    let out = Resolution::new(16, 8).unwrap();
    let mut fan = FanOut::new(Some(out), fps()).with_recorder(Box::new(rec.clone()));
    fan.dispatch(&composite(7, 3));
    assert_eq!(rec.0.lock().unwrap().frames()[0].resolution(), out);
}

#[test]
fn stream_requires_configured_size() {
    let mut fan = FanOut::new(None, fps()).with_stream(Box::new(Shared::default()));
    assert!(matches!(fan.start(), Err(StitchError::Config(_))));
}

#[test]
fn failing_recorder_does_not_block_preview_or_stream() {
    let screen = Screen::default();
    let stream = Shared::default();
    let ends = Arc::new(Mutex::new(0));
    let mut fan = FanOut::new(Some(Resolution::new(8, 4).unwrap()), fps())
        .with_preview(Box::new(screen.clone()))
        .with_recorder(Box::new(Flaky {
            accepted: 0,
            fail_from: 0,
            ends: Arc::clone(&ends),
        }))
        .with_stream(Box::new(stream.clone()));
    fan.start().unwrap();

    for _ in 0..2 {
        let report = fan.dispatch(&composite(8, 4));
        assert_eq!(report.preview, DeliveryStatus::Delivered);
        assert!(matches!(report.record, DeliveryStatus::Failed(_)));
        assert_eq!(report.stream, DeliveryStatus::Delivered);
    }
    assert_eq!(screen.0.lock().unwrap().len(), 2);
    assert_eq!(stream.0.lock().unwrap().frames().len(), 2);

    // The recorder stays attached and is finalized once.
    fan.finish_record().unwrap();
    fan.finish_record().unwrap();
    assert_eq!(*ends.lock().unwrap(), 1);
}

#[test]
fn recorder_that_cannot_open_is_dropped() {
    let mut fan = FanOut::new(None, fps()).with_recorder(Box::new(RefusesToOpen));
    assert!(matches!(
        fan.dispatch(&composite(8, 4)).record,
        DeliveryStatus::Failed(_)
    ));
    assert_eq!(fan.dispatch(&composite(8, 4)).record, DeliveryStatus::Disabled);
    fan.finish_record().unwrap();
}

#[test]
fn broken_stream_is_disabled_and_finalized_once() {
    let ends = Arc::new(Mutex::new(0));
    let rec = Shared::default();
    let mut fan = FanOut::new(Some(Resolution::new(8, 4).unwrap()), fps())
        .with_recorder(Box::new(rec.clone()))
        .with_stream(Box::new(Flaky {
            accepted: 0,
            fail_from: 1,
            ends: Arc::clone(&ends),
        }));
    fan.start().unwrap();

    assert_eq!(fan.dispatch(&composite(8, 4)).stream, DeliveryStatus::Delivered);
    assert!(matches!(
        fan.dispatch(&composite(8, 4)).stream,
        DeliveryStatus::Failed(_)
    ));
    assert!(!fan.is_streaming());
    assert_eq!(fan.dispatch(&composite(8, 4)).stream, DeliveryStatus::Disabled);
    assert_eq!(rec.0.lock().unwrap().frames().len(), 3);

    fan.finish_stream().unwrap();
    assert_eq!(*ends.lock().unwrap(), 1);
}

#[test]
fn preview_quit_is_reported_after_deliveries() {
    let rec = Shared::default();
    let mut fan = FanOut::new(None, fps())
        .with_preview(Box::new(Screen::default()))
        .with_recorder(Box::new(rec.clone()));
    assert!(!fan.dispatch(&composite(8, 4)).quit_requested);
    assert!(!fan.dispatch(&composite(8, 4)).quit_requested);
    let last = fan.dispatch(&composite(8, 4));
    assert!(last.quit_requested);
    assert_eq!(last.record, DeliveryStatus::Delivered);
    assert_eq!(rec.0.lock().unwrap().frames().len(), 3);
}
