use crate::feed::source::{Feed, FrameSource};
use crate::foundation::core::Frame;
use crate::foundation::error::{StitchError, StitchResult};

/// The ordered inputs of a pipeline, polled as a unit.
///
/// Order is the stitching order and never changes. Frames are only handed out for a cycle in
/// which every source reported a next frame.
pub struct FeedSet<S: FrameSource = Feed> {
    sources: Vec<S>,
    armed: bool,
    closed: bool,
}

impl<S: FrameSource> FeedSet<S> {
    /// Wrap `sources`, which must not be empty.
    pub fn new(sources: Vec<S>) -> StitchResult<Self> {
        if sources.is_empty() {
            return Err(StitchError::validation("feed set needs at least one source"));
        }
        Ok(Self {
            sources,
            armed: false,
            closed: false,
        })
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Always `false`; a feed set is never empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The sources, in stitching order.
    pub fn sources(&self) -> &[S] {
        &self.sources
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Probe every source. A probe error counts as an invalid source.
    pub fn all_valid(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let mut valid = true;
        for (idx, src) in self.sources.iter_mut().enumerate() {
            match src.probe() {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(idx, source = %src.describe(), "source is not valid");
                    valid = false;
                }
                Err(e) => {
                    tracing::warn!(idx, source = %src.describe(), error = %e, "source probe failed");
                    valid = false;
                }
            }
        }
        valid
    }

    /// `true` only if every source has a next frame. Stops at the first exhausted source.
    pub fn all_have_next(&mut self) -> StitchResult<bool> {
        self.armed = false;
        if self.closed {
            return Ok(false);
        }
        for (idx, src) in self.sources.iter_mut().enumerate() {
            if !src.has_next()? {
                tracing::info!(idx, source = %src.describe(), "source exhausted");
                return Ok(false);
            }
        }
        self.armed = true;
        Ok(true)
    }

    /// One frame per source, in order. Only valid right after `all_have_next` returned `true`.
    pub fn pull_all(&mut self) -> StitchResult<Vec<Frame>> {
        if !self.armed {
            return Err(StitchError::validation(
                "pull_all requires a preceding all_have_next() == true",
            ));
        }
        self.armed = false;
        self.sources.iter_mut().map(|s| s.next_frame()).collect()
    }

    /// Release every source. Idempotent; every source is closed even if one fails.
    pub fn close(&mut self) -> StitchResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.armed = false;

        let mut errors = Vec::new();
        for (idx, src) in self.sources.iter_mut().enumerate() {
            if let Err(e) = src.close() {
                errors.push(format!("source {idx} ({}): {e}", src.describe()));
            }
        }
        if errors.is_empty() {
            tracing::debug!(sources = self.sources.len(), "feed set closed");
            Ok(())
        } else {
            Err(StitchError::source(errors.join("; ")))
        }
    }
}

impl<S: FrameSource> Drop for FeedSet<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close feed set on drop");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/feed/set.rs"]
mod tests;
