use crate::align::estimate::{MIN_POINTS, estimate_homography};
use crate::align::homography::Homography;
use crate::foundation::core::Frame;
use crate::foundation::error::{StitchError, StitchResult};

/// Neighbor count requested from descriptor matchers (best + second best for the ratio test).
pub const KNN_NEIGHBORS: usize = 2;

/// Tuning knobs handed to an [`ImageAligner`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AlignParams {
    /// Lowe ratio: keep a match only when `best < ratio * second_best`.
    pub ratio: f32,
    /// Below this many ratio-filtered matches no homography is estimated.
    pub min_good_matches: usize,
    /// Reprojection error (pixels) above which a correspondence counts as an outlier.
    pub reproj_threshold: f64,
    /// Upper bound on composite canvas area; larger warps are treated as degenerate.
    pub max_canvas_pixels: u64,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            ratio: 0.7,
            min_good_matches: 20,
            reproj_threshold: 5.0,
            max_canvas_pixels: 50_000_000,
        }
    }
}

/// What an [`ImageAligner`] found for one frame pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlignOutcome {
    /// A homography mapping the incoming frame into the reference frame.
    Homography(Homography),
    /// Too few good matches this cycle; try again with the next frames.
    InsufficientMatches {
        /// Matches that survived the ratio test.
        good: usize,
        /// The configured minimum.
        required: usize,
    },
}

/// Feature matching + homography estimation for one frame pair.
///
/// "Not enough matches" is an expected outcome reported through [`AlignOutcome`]; `Err` is
/// reserved for failures of the aligner itself.
pub trait ImageAligner: Send {
    /// Estimate the homography mapping `incoming` into `reference`.
    fn match_frames(
        &mut self,
        reference: &Frame,
        incoming: &Frame,
        params: &AlignParams,
    ) -> StitchResult<AlignOutcome>;
}

/// Aligner for calibrated rigs: always returns a homography fixed at construction.
#[derive(Clone, Copy, Debug)]
pub struct FixedAligner {
    homography: Homography,
}

impl FixedAligner {
    /// Create an aligner that always reports `homography`.
    pub fn new(homography: Homography) -> Self {
        Self { homography }
    }
}

impl ImageAligner for FixedAligner {
    fn match_frames(
        &mut self,
        _reference: &Frame,
        _incoming: &Frame,
        _params: &AlignParams,
    ) -> StitchResult<AlignOutcome> {
        Ok(AlignOutcome::Homography(self.homography))
    }
}

/// One nearest-neighbor candidate produced by a [`KeypointMatcher`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchCandidate {
    /// Descriptor distance.
    pub distance: f32,
    /// Keypoint location in the reference frame.
    pub reference: (f64, f64),
    /// Keypoint location in the incoming frame.
    pub incoming: (f64, f64),
}

/// Keypoint detection + descriptor matching.
///
/// For every incoming keypoint, return up to `k` reference candidates sorted by ascending
/// distance.
pub trait KeypointMatcher: Send {
    /// Match descriptors between both frames.
    fn knn_match(
        &mut self,
        reference: &Frame,
        incoming: &Frame,
        k: usize,
    ) -> StitchResult<Vec<Vec<MatchCandidate>>>;
}

/// Aligner built on an external [`KeypointMatcher`]: applies the ratio test and the minimum match
/// count, then fits a homography with outlier rejection.
pub struct CorrespondenceAligner<M> {
    matcher: M,
}

impl<M: KeypointMatcher> CorrespondenceAligner<M> {
    /// Wrap a keypoint matcher.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }
}

impl<M: KeypointMatcher> ImageAligner for CorrespondenceAligner<M> {
    #[tracing::instrument(level = "debug", skip_all)]
    fn match_frames(
        &mut self,
        reference: &Frame,
        incoming: &Frame,
        params: &AlignParams,
    ) -> StitchResult<AlignOutcome> {
        if params.min_good_matches < MIN_POINTS {
            return Err(StitchError::alignment(format!(
                "min_good_matches is {}, a homography needs at least {MIN_POINTS}",
                params.min_good_matches
            )));
        }
        let raw = self.matcher.knn_match(reference, incoming, KNN_NEIGHBORS)?;
        let good = ratio_filter(&raw, params.ratio);
        let required = params.min_good_matches;
        if good.len() < required {
            return Ok(AlignOutcome::InsufficientMatches {
                good: good.len(),
                required,
            });
        }

        let src: Vec<(f64, f64)> = good.iter().map(|m| m.incoming).collect();
        let dst: Vec<(f64, f64)> = good.iter().map(|m| m.reference).collect();
        match estimate_homography(&src, &dst, params.reproj_threshold) {
            Some(fit) => {
                tracing::debug!(
                    good = good.len(),
                    inliers = fit.inliers,
                    "estimated homography"
                );
                Ok(AlignOutcome::Homography(fit.homography))
            }
            None => Ok(AlignOutcome::InsufficientMatches {
                good: good.len(),
                required,
            }),
        }
    }
}

/// Keep the best candidate of every pair whose best distance is below `ratio * second`.
pub(crate) fn ratio_filter(raw: &[Vec<MatchCandidate>], ratio: f32) -> Vec<MatchCandidate> {
    raw.iter()
        .filter_map(|cands| match cands.as_slice() {
            [best, second, ..] if best.distance < ratio * second.distance => Some(*best),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/align/aligner.rs"]
mod tests;
