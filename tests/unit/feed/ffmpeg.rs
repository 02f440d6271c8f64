use std::io::Cursor;

use super::*;

/// Hands out at most `chunk` bytes per read, like a pipe under load.
struct Trickle {
    inner: Cursor<Vec<u8>>,
    chunk: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.inner.read(&mut buf[..n])
    }
}

#[test]
fn reads_whole_frames_across_short_reads() {
    let mut src = Trickle {
        inner: Cursor::new((0u8..24).collect()),
        chunk: 5,
    };
    let mut buf = [0u8; 12];
    assert!(read_raw_frame(&mut src, &mut buf).unwrap());
    assert_eq!(buf.to_vec(), (0u8..12).collect::<Vec<_>>());
    assert!(read_raw_frame(&mut src, &mut buf).unwrap());
    assert_eq!(buf[0], 12);
    assert!(!read_raw_frame(&mut src, &mut buf).unwrap());
}

#[test]
fn truncated_trailing_frame_is_end_of_stream() {
    let mut src = Cursor::new(vec![1u8; 7]);
    let mut buf = [0u8; 12];
    assert!(!read_raw_frame(&mut src, &mut buf).unwrap());
}

#[test]
fn command_args_request_rgb24_on_stdout() {
    let input = DecodeInput {
        args: vec!["-i".into(), "left.mp4".into()],
        size: Resolution::new(640, 480).unwrap(),
    };
    let args: Vec<String> = input
        .command_args(Some(1))
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let joined = args.join(" ");
    assert!(joined.starts_with("-v error -nostdin -i left.mp4 -frames:v 1"));
    assert!(joined.ends_with("-an -f rawvideo -pix_fmt rgb24 -s 640x480 pipe:1"));
    assert!(!input.command_args(None).iter().any(|a| a == "-frames:v"));
}

#[test]
fn take_without_look_ahead_is_refused() {
    let mut look = LookAhead::new(0, None);
    assert!(matches!(look.take(), Err(StitchError::Validation(_))));
}

#[test]
fn closed_look_ahead_reports_exhausted_without_spawning() {
    let mut look = LookAhead::new(0, None);
    look.close().unwrap();
    let has_next = look
        .has_next(|| Err(StitchError::source("must not be opened after close")))
        .unwrap();
    assert!(!has_next);
}

#[test]
fn open_failure_propagates_from_has_next() {
    let mut look = LookAhead::new(2, Some(320));
    assert!(matches!(
        look.has_next(|| Err(StitchError::source("device busy"))),
        Err(StitchError::Source(_))
    ));
}

#[test]
fn closing_a_running_decoder_stops_and_reaps_it() {
    if !crate::sink::ffmpeg::is_ffmpeg_on_path() {
        return;
    }
    // An endless synthetic input: the decoder is still running when it is closed.
    let input = DecodeInput {
        args: ["-f", "lavfi", "-i", "testsrc=size=16x8:rate=30"]
            .map(OsString::from)
            .to_vec(),
        size: Resolution::new(16, 8).unwrap(),
    };
    let mut reader = RawVideoReader::spawn(&input).unwrap();
    let frame = reader.read_frame().unwrap().unwrap();
    assert_eq!(frame.len(), input.size.frame_len());
    reader.close().unwrap();
}
