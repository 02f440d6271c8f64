use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::foundation::core::{Frame, Resolution, SourceTag};
use crate::foundation::error::{StitchError, StitchResult};

/// Probe the first video stream of `path` through `ffprobe`.
pub fn probe_video_size(path: &Path) -> StitchResult<Resolution> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| StitchError::source(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StitchError::source(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| StitchError::source(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| StitchError::source(format!("no video stream in '{}'", path.display())))?;
    match (stream.width, stream.height) {
        (Some(w), Some(h)) => Resolution::new(w, h),
        _ => Err(StitchError::source("missing video dimensions from ffprobe")),
    }
}

/// How a decoder obtains its input: the arguments placed before `pipe:1`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DecodeInput {
    pub(crate) args: Vec<OsString>,
    pub(crate) size: Resolution,
}

impl DecodeInput {
    /// Command line for `ffmpeg`, writing raw RGB24 frames of `size` to stdout.
    pub(crate) fn command_args(&self, frame_limit: Option<u32>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-nostdin".into()];
        args.extend(self.args.iter().cloned());
        if let Some(n) = frame_limit {
            args.push("-frames:v".into());
            args.push(n.to_string().into());
        }
        args.extend(
            [
                "-an",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                self.size.to_string().as_str(),
                "pipe:1",
            ]
            .map(OsString::from),
        );
        args
    }
}

/// Read exactly one frame into `buf`.
///
/// Returns `Ok(false)` at end of stream. A truncated trailing frame also counts as end of stream.
pub(crate) fn read_raw_frame(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if filled != 0 && filled < buf.len() {
        tracing::warn!(
            got = filled,
            expected = buf.len(),
            "dropping truncated trailing frame"
        );
    }
    Ok(filled == buf.len())
}

/// A running `ffmpeg` decoder streaming raw RGB24 frames on stdout.
pub(crate) struct RawVideoReader {
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    size: Resolution,
}

impl RawVideoReader {
    /// Spawn the decoder.
    pub(crate) fn spawn(input: &DecodeInput) -> StitchResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(input.command_args(None))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                StitchError::source(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StitchError::source("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StitchError::source("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            child,
            stdout,
            stderr_drain: Some(stderr_drain),
            size: input.size,
        })
    }

    /// Next frame, or `None` once the decoder has no more output.
    pub(crate) fn read_frame(&mut self) -> StitchResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.size.frame_len()];
        let complete = read_raw_frame(&mut self.stdout, &mut buf)
            .map_err(|e| StitchError::source(format!("failed to read from ffmpeg stdout: {e}")))?;
        Ok(complete.then_some(buf))
    }

    /// Stop the decoder and reap it. Decoder errors on stderr are logged, not returned.
    pub(crate) fn close(mut self) -> StitchResult<()> {
        if self.child.try_wait()?.is_none() {
            // Still producing frames we no longer want.
            if let Err(e) = self.child.kill() {
                tracing::debug!(error = %e, "failed to kill decoder");
            }
        }
        let status = self
            .child
            .wait()
            .map_err(|e| StitchError::source(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StitchError::source("ffmpeg stderr drain thread panicked"))??,
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        if !stderr.trim().is_empty() {
            tracing::debug!(%status, stderr = %stderr.trim(), "decoder exited");
        }
        Ok(())
    }
}

/// Grab a single frame synchronously. `Ok(None)` when the input produced nothing.
pub(crate) fn grab_one(input: &DecodeInput) -> StitchResult<Option<Vec<u8>>> {
    let out = Command::new("ffmpeg")
        .args(input.command_args(Some(1)))
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            StitchError::source(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
    if !out.status.success() {
        tracing::debug!(
            stderr = %String::from_utf8_lossy(&out.stderr).trim(),
            "single-frame grab failed"
        );
        return Ok(None);
    }
    let len = input.size.frame_len();
    if out.stdout.len() < len {
        return Ok(None);
    }
    let mut data = out.stdout;
    data.truncate(len);
    Ok(Some(data))
}

/// Grab/retrieve wrapper around a lazily spawned [`RawVideoReader`].
///
/// `has_next` decodes one frame into a look-ahead slot; `take` hands it out. Once the decoder
/// runs dry the wrapper stays exhausted.
pub(crate) struct LookAhead {
    tag: SourceTag,
    scale_width: Option<u32>,
    reader: Option<RawVideoReader>,
    pending: Option<Frame>,
    exhausted: bool,
}

impl LookAhead {
    pub(crate) fn new(index: usize, scale_width: Option<u32>) -> Self {
        Self {
            tag: SourceTag::Feed(index),
            scale_width,
            reader: None,
            pending: None,
            exhausted: false,
        }
    }

    pub(crate) fn has_next(
        &mut self,
        open: impl FnOnce() -> StitchResult<DecodeInput>,
    ) -> StitchResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.exhausted {
            return Ok(false);
        }
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => RawVideoReader::spawn(&open()?)?,
        };
        let reader = self.reader.insert(reader);
        let size = reader.size;
        match reader.read_frame()? {
            Some(data) => {
                let frame = Frame::new(size.width, size.height, data, self.tag)?;
                self.pending = Some(match self.scale_width {
                    Some(w) => frame.resize_to_width(w),
                    None => frame,
                });
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    pub(crate) fn take(&mut self) -> StitchResult<Frame> {
        self.pending
            .take()
            .ok_or_else(|| StitchError::validation("next_frame called without a successful has_next"))
    }

    pub(crate) fn close(&mut self) -> StitchResult<()> {
        self.pending = None;
        self.exhausted = true;
        match self.reader.take() {
            Some(reader) => reader.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/feed/ffmpeg.rs"]
mod tests;
