use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::PreviewConfig;
use crate::foundation::core::Frame;
use crate::foundation::error::{StitchError, StitchResult};
use crate::sink::ffmpeg::ensure_parent_dir;

/// What the viewer asked for after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewKey {
    /// Keep running.
    Continue,
    /// Stop the pipeline after this tick.
    Quit,
}

/// A display surface polled once per composite.
pub trait Preview: Send {
    /// Show `frame` and report whether the viewer asked to quit. Must not block for long.
    fn present(&mut self, frame: &Frame) -> StitchResult<PreviewKey>;
    /// Tear the surface down.
    fn close(&mut self) -> StitchResult<()>;
}

/// Headless preview: refreshes a PNG snapshot every `every_n_frames` composites.
///
/// Creating `<path>.quit` next to the snapshot acts as the quit key.
pub struct SnapshotPreview {
    path: PathBuf,
    quit_marker: PathBuf,
    every_n: u64,
    presented: u64,
}

impl SnapshotPreview {
    /// Create the preview and clear any quit marker left behind by an earlier run.
    pub fn new(cfg: &PreviewConfig) -> StitchResult<Self> {
        let quit_marker = quit_marker_for(&cfg.path);
        remove_if_exists(&quit_marker)?;
        Ok(Self {
            path: cfg.path.clone(),
            quit_marker,
            every_n: u64::from(cfg.every_n_frames.max(1)),
            presented: 0,
        })
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File whose presence requests a stop.
    pub fn quit_marker(&self) -> &Path {
        &self.quit_marker
    }

    fn write_snapshot(&self, frame: &Frame) -> StitchResult<()> {
        ensure_parent_dir(&self.path)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        frame
            .to_rgb_image()
            .save_with_format(&tmp, image::ImageFormat::Png)
            .map_err(|e| StitchError::sink(format!("failed to write preview snapshot: {e}")))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Preview for SnapshotPreview {
    fn present(&mut self, frame: &Frame) -> StitchResult<PreviewKey> {
        if self.presented.is_multiple_of(self.every_n) {
            self.write_snapshot(frame)?;
        }
        self.presented += 1;
        if self.quit_marker.exists() {
            tracing::info!(marker = %self.quit_marker.display(), "quit requested from preview");
            return Ok(PreviewKey::Quit);
        }
        Ok(PreviewKey::Continue)
    }

    fn close(&mut self) -> StitchResult<()> {
        remove_if_exists(&self.quit_marker)
    }
}

fn quit_marker_for(path: &Path) -> PathBuf {
    let mut marker: OsString = path.as_os_str().to_owned();
    marker.push(".quit");
    PathBuf::from(marker)
}

fn remove_if_exists(path: &Path) -> StitchResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sink/preview.rs"]
mod tests;
