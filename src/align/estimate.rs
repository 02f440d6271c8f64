//! Homography estimation from point correspondences.
//!
//! Normalized DLT (Hartley) solved through the smallest eigenvector of `AᵀA`, wrapped in an
//! iterative trimming loop that discards correspondences with large reprojection error.

use nalgebra::{Matrix3, SMatrix, SVector};

use crate::align::homography::Homography;

pub(crate) const MIN_POINTS: usize = 4;
const MAX_ROUNDS: usize = 20;
const TRIM_MEDIAN_FACTOR: f64 = 2.5;

/// A fitted homography and the number of correspondences within the reprojection threshold.
#[derive(Clone, Copy, Debug)]
pub(crate) struct HomographyFit {
    pub(crate) homography: Homography,
    pub(crate) inliers: usize,
}

/// Fit `src -> dst`, tolerating outliers. `None` when fewer than four inliers remain.
pub(crate) fn estimate_homography(
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    threshold: f64,
) -> Option<HomographyFit> {
    if src.len() != dst.len() || src.len() < MIN_POINTS {
        return None;
    }

    let mut keep: Vec<usize> = (0..src.len()).collect();
    let mut h = None;
    for _ in 0..MAX_ROUNDS {
        if keep.len() < MIN_POINTS {
            break;
        }
        let s: Vec<_> = keep.iter().map(|&i| src[i]).collect();
        let d: Vec<_> = keep.iter().map(|&i| dst[i]).collect();
        let Some(fit) = fit_dlt(&s, &d) else {
            break;
        };
        h = Some(fit);

        let residuals: Vec<f64> = keep
            .iter()
            .map(|&i| reprojection_error(&fit, src[i], dst[i]))
            .collect();
        if residuals.iter().all(|&r| r <= threshold) {
            break;
        }
        let cutoff = threshold.max(TRIM_MEDIAN_FACTOR * median(&residuals));
        let next: Vec<usize> = keep
            .iter()
            .zip(&residuals)
            .filter(|&(_, &r)| r <= cutoff)
            .map(|(&i, _)| i)
            .collect();
        if next.len() == keep.len() {
            // Nothing above the cutoff: tighten to the threshold directly.
            keep.retain(|&i| reprojection_error(&fit, src[i], dst[i]) <= threshold);
        } else {
            keep = next;
        }
    }

    let homography = h?;
    let inliers = src
        .iter()
        .zip(dst)
        .filter(|&(s, d)| reprojection_error(&homography, *s, *d) <= threshold)
        .count();
    (inliers >= MIN_POINTS).then_some(HomographyFit {
        homography,
        inliers,
    })
}

fn reprojection_error(h: &Homography, s: (f64, f64), d: (f64, f64)) -> f64 {
    match h.project(s.0, s.1) {
        Some((x, y)) => ((x - d.0).powi(2) + (y - d.1).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

fn median(values: &[f64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v[v.len() / 2]
}

fn fit_dlt(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Homography> {
    let (ts, src_n) = normalize_points(src)?;
    let (td, dst_n) = normalize_points(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (&(x, y), &(u, v)) in src_n.iter().zip(&dst_n) {
        let r1 = SVector::<f64, 9>::from([-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        let r2 = SVector::<f64, 9>::from([0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        ata += r1 * r1.transpose();
        ata += r2 * r2.transpose();
    }

    let eig = ata.symmetric_eigen();
    let smallest = eig.eigenvalues.imin();
    let h: Vec<f64> = eig.eigenvectors.column(smallest).iter().copied().collect();
    let hn = Matrix3::from_row_slice(&h);

    let td_inv = td.try_inverse()?;
    Homography::new(td_inv * hn * ts).ok()
}

/// Translate to the centroid and scale so the mean distance from it is `sqrt(2)`.
fn normalize_points(pts: &[(f64, f64)]) -> Option<(Matrix3<f64>, Vec<(f64, f64)>)> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| (s * (p.0 - cx), s * (p.1 - cy))).collect();
    Some((t, normalized))
}

#[cfg(test)]
#[path = "../../tests/unit/align/estimate.rs"]
mod tests;
