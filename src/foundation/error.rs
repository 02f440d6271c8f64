/// Result alias used across the crate.
pub type StitchResult<T> = Result<T, StitchError>;

/// Errors raised by the stitching pipeline.
///
/// Expected per-cycle outcomes (too few feature matches, a degenerate warp) are *not* errors; they
/// surface as [`crate::AlignmentFailure`] values instead.
#[derive(thiserror::Error, Debug)]
pub enum StitchError {
    /// Invalid configuration, detected before the pipeline starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller violated an API contract (frame count, buffer size, call order).
    #[error("validation error: {0}")]
    Validation(String),

    /// A frame source could not be opened, probed or read.
    #[error("source error: {0}")]
    Source(String),

    /// A sink (preview, recorder, encoder pipe) failed to accept a frame.
    #[error("sink error: {0}")]
    Sink(String),

    /// The image aligner failed for a reason other than insufficient matches.
    #[error("alignment error: {0}")]
    Alignment(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Anything else, with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StitchError {
    /// Build a [`StitchError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`StitchError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StitchError::Source`].
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Build a [`StitchError::Sink`].
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Build a [`StitchError::Alignment`].
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment(msg.into())
    }

    /// Return `true` when this error is a broken pipe on an I/O write.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
