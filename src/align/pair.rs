use crate::align::aligner::{AlignOutcome, AlignParams, ImageAligner};
use crate::align::homography::Homography;
use crate::align::warp::composite_pair;
use crate::foundation::core::Frame;
use crate::foundation::error::StitchResult;

/// Cache state of a [`PairAligner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairState {
    /// No homography yet; the next `align` consults the image aligner.
    Empty,
    /// A homography is cached and reused until `reset`.
    Ready,
}

/// Why a cycle's composite could not be produced.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentFailure {
    /// Merge node that failed (position in its composition tree).
    pub node: usize,
    /// What went wrong.
    pub kind: FailureKind,
}

/// Category of an [`AlignmentFailure`].
#[derive(Clone, Debug, PartialEq)]
pub enum FailureKind {
    /// The aligner found too few good matches.
    InsufficientMatches {
        /// Matches that survived the ratio test.
        good: usize,
        /// The configured minimum.
        required: usize,
    },
    /// The homography produced an unusable canvas.
    Degenerate(String),
}

impl std::fmt::Display for AlignmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FailureKind::InsufficientMatches { good, required } => write!(
                f,
                "node {}: {good} good matches, need {required}",
                self.node
            ),
            FailureKind::Degenerate(why) => write!(f, "node {}: {why}", self.node),
        }
    }
}

/// Result of stitching one cycle's frames.
#[derive(Clone, Debug, PartialEq)]
pub enum StitchOutcome {
    /// The merged frame.
    Composite(Frame),
    /// No composite this cycle; the pipeline should skip the tick and carry on.
    Skipped(AlignmentFailure),
}

impl StitchOutcome {
    /// The composite, if one was produced.
    pub fn composite(self) -> Option<Frame> {
        match self {
            Self::Composite(f) => Some(f),
            Self::Skipped(_) => None,
        }
    }
}

/// Stitches frames from two fixed viewpoints, estimating their homography once and reusing it.
pub struct PairAligner {
    node: usize,
    aligner: Box<dyn ImageAligner>,
    params: AlignParams,
    cached: Option<Homography>,
}

impl PairAligner {
    /// Create an empty aligner for merge node `node`.
    pub fn new(node: usize, aligner: Box<dyn ImageAligner>, params: AlignParams) -> Self {
        Self {
            node,
            aligner,
            params,
            cached: None,
        }
    }

    /// Merge node index.
    pub fn node(&self) -> usize {
        self.node
    }

    /// Current cache state.
    pub fn state(&self) -> PairState {
        if self.cached.is_some() {
            PairState::Ready
        } else {
            PairState::Empty
        }
    }

    /// The cached homography, if any.
    pub fn homography(&self) -> Option<&Homography> {
        self.cached.as_ref()
    }

    /// Drop the cached homography so the next `align` re-estimates it.
    pub fn reset(&mut self) {
        if self.cached.take().is_some() {
            tracing::info!(node = self.node, "homography cache cleared");
        }
    }

    /// Stitch `incoming` onto `reference`.
    ///
    /// The aligner is consulted only while the cache is empty. The reference frame is copied
    /// unwarped and wins in the overlap.
    #[tracing::instrument(level = "debug", skip_all, fields(node = self.node))]
    pub fn align(&mut self, reference: &Frame, incoming: &Frame) -> StitchResult<StitchOutcome> {
        let (h, fresh) = match self.cached {
            Some(h) => (h, false),
            None => match self
                .aligner
                .match_frames(reference, incoming, &self.params)?
            {
                AlignOutcome::Homography(h) => (h, true),
                AlignOutcome::InsufficientMatches { good, required } => {
                    tracing::debug!(good, required, "not enough matches, retrying next cycle");
                    return Ok(StitchOutcome::Skipped(AlignmentFailure {
                        node: self.node,
                        kind: FailureKind::InsufficientMatches { good, required },
                    }));
                }
            },
        };

        match composite_pair(reference, incoming, &h, self.params.max_canvas_pixels) {
            Ok(frame) => {
                if fresh {
                    tracing::info!(node = self.node, homography = ?h.to_row_major(), "homography cached");
                    self.cached = Some(h);
                }
                Ok(StitchOutcome::Composite(frame))
            }
            Err(why) => {
                tracing::warn!(node = self.node, %why, "discarding unusable homography");
                self.cached = None;
                Ok(StitchOutcome::Skipped(AlignmentFailure {
                    node: self.node,
                    kind: FailureKind::Degenerate(why.to_string()),
                }))
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/align/pair.rs"]
mod tests;
