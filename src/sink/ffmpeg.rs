use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::config::{RecordConfig, StreamConfig};
use crate::foundation::core::Frame;
use crate::foundation::error::{StitchError, StitchResult};
use crate::sink::{FrameSink, SinkConfig};

/// Where an [`FfmpegSink`] sends its encoded output.
#[derive(Clone, Debug, PartialEq)]
pub enum FfmpegOutput {
    /// An H.264 MP4 file.
    File {
        /// Output path.
        path: PathBuf,
        /// Replace an existing file.
        overwrite: bool,
    },
    /// A live stream (the encoder pipe).
    Stream {
        /// Destination handed to the encoder.
        address: String,
        /// Container format (`flv` for RTMP).
        format: String,
        /// Codec arguments placed before the output.
        extra_args: Vec<String>,
    },
}

/// Sink that spawns an encoder process and streams raw RGB24 frames to its stdin.
///
/// `push_frame` blocks while the encoder is busy; that write is the pipeline's only
/// backpressure point.
pub struct FfmpegSink {
    program: String,
    output: FfmpegOutput,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    cfg: Option<SinkConfig>,
}

impl FfmpegSink {
    /// Create a sink running `program` (normally `ffmpeg`) for `output`.
    pub fn new(program: impl Into<String>, output: FfmpegOutput) -> Self {
        Self {
            program: program.into(),
            output,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
        }
    }

    /// MP4 recorder.
    pub fn recorder(cfg: &RecordConfig) -> Self {
        Self::new(
            "ffmpeg",
            FfmpegOutput::File {
                path: cfg.path.clone(),
                overwrite: cfg.overwrite,
            },
        )
    }

    /// Live encoder pipe.
    pub fn stream(cfg: &StreamConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            FfmpegOutput::Stream {
                address: cfg.address.clone(),
                format: cfg.format.clone(),
                extra_args: cfg.extra_args.clone(),
            },
        )
    }

    /// Full encoder command line for frames described by `cfg`.
    pub fn command_args(&self, cfg: SinkConfig) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        if let FfmpegOutput::File { overwrite, .. } = &self.output {
            args.push(if *overwrite { "-y" } else { "-n" }.to_string());
        }
        // For rawvideo input, `-r` before `-i` sets the input frame rate.
        args.extend(
            [
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                cfg.resolution.to_string().as_str(),
                "-r",
                cfg.fps.as_rate_arg().as_str(),
                "-i",
                "pipe:0",
                "-an",
            ]
            .map(String::from),
        );
        match &self.output {
            FfmpegOutput::File { path, .. } => {
                args.extend(
                    ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"]
                        .map(String::from),
                );
                args.push(path.display().to_string());
            }
            FfmpegOutput::Stream {
                address,
                format,
                extra_args,
            } => {
                args.extend(extra_args.iter().cloned());
                args.push("-f".to_string());
                args.push(format.clone());
                args.push(address.clone());
            }
        }
        args
    }

    fn label(&self) -> &'static str {
        match self.output {
            FfmpegOutput::File { .. } => "recorder",
            FfmpegOutput::Stream { .. } => "encoder pipe",
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> StitchResult<()> {
        if self.child.is_some() {
            return Err(StitchError::sink(format!("{} already started", self.label())));
        }
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(StitchError::validation("fps must be non-zero"));
        }
        if cfg.resolution.even() != cfg.resolution {
            return Err(StitchError::validation(format!(
                "{} size {} must be even (required for yuv420p output)",
                self.label(),
                cfg.resolution
            )));
        }
        if let FfmpegOutput::File { path, overwrite } = &self.output {
            ensure_parent_dir(path)?;
            if !*overwrite && path.exists() {
                return Err(StitchError::sink(format!(
                    "output file '{}' already exists",
                    path.display()
                )));
            }
        }

        let args = self.command_args(cfg);
        tracing::debug!(program = %self.program, ?args, "spawning encoder");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                StitchError::sink(format!(
                    "failed to spawn {} (is it installed and on PATH?): {e}",
                    self.program
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StitchError::sink("failed to open encoder stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StitchError::sink("failed to open encoder stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::info!(sink = self.label(), size = %cfg.resolution, fps = cfg.fps.as_f64(), "encoder started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> StitchResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| StitchError::sink(format!("{} not started", self.label())))?;
        if frame.resolution() != cfg.resolution {
            return Err(StitchError::validation(format!(
                "frame size mismatch: got {}, expected {}",
                frame.resolution(),
                cfg.resolution
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StitchError::sink(format!(
                "{} is already finalized",
                self.label()
            )));
        };
        // Keep the io::Error intact so callers can recognize a broken pipe.
        stdin.write_all(frame.data())?;
        Ok(())
    }

    fn end(&mut self) -> StitchResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StitchError::sink(format!("{} not started", self.label())))?;

        let status = child
            .wait()
            .map_err(|e| StitchError::sink(format!("failed to wait for encoder to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StitchError::sink("encoder stderr drain thread panicked"))?
                .map_err(|e| StitchError::sink(format!("encoder stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        self.cfg = None;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(StitchError::sink(format!(
                "{} exited with status {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }
        tracing::info!(sink = self.label(), "encoder finished");
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> StitchResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/sink/ffmpeg.rs"]
mod tests;
