//! Pairwise alignment: homographies, image aligners and the caching [`pair::PairAligner`].

pub mod aligner;
pub(crate) mod estimate;
pub mod homography;
pub mod pair;
pub(crate) mod warp;
