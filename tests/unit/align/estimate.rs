use super::*;

fn grid_points() -> Vec<(f64, f64)> {
    let mut pts = Vec::new();
    for gy in 0..5 {
        for gx in 0..6 {
            pts.push((10.0 + gx as f64 * 37.0, 8.0 + gy as f64 * 29.0));
        }
    }
    pts
}

fn truth() -> Homography {
    Homography::from_row_major([0.98, 0.03, 145.0, -0.02, 1.01, 4.0, 2e-5, -1e-5, 1.0]).unwrap()
}

fn assert_close(a: &Homography, b: &Homography) {
    for (x, y) in [(0.0, 0.0), (200.0, 0.0), (0.0, 150.0), (200.0, 150.0)] {
        let (ax, ay) = a.project(x, y).unwrap();
        let (bx, by) = b.project(x, y).unwrap();
        assert!((ax - bx).abs() < 1e-3, "x mismatch at ({x},{y}): {ax} vs {bx}");
        assert!((ay - by).abs() < 1e-3, "y mismatch at ({x},{y}): {ay} vs {by}");
    }
}

#[test]
fn recovers_exact_homography_from_clean_points() {
    let h = truth();
    let src = grid_points();
    let dst: Vec<_> = src.iter().map(|&(x, y)| h.project(x, y).unwrap()).collect();

    let fit = estimate_homography(&src, &dst, 1.0).unwrap();
    assert_eq!(fit.inliers, src.len());
    assert_close(&fit.homography, &h);
}

#[test]
fn rejects_gross_outliers() {
    let h = truth();
    let src = grid_points();
    let mut dst: Vec<_> = src.iter().map(|&(x, y)| h.project(x, y).unwrap()).collect();
    for i in [2usize, 9, 17, 23] {
        dst[i].0 += 300.0;
        dst[i].1 -= 120.0;
    }

    let fit = estimate_homography(&src, &dst, 2.0).unwrap();
    assert_eq!(fit.inliers, src.len() - 4);
    assert_close(&fit.homography, &h);
}

#[test]
fn too_few_or_degenerate_points_fail() {
    let src = vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
    assert!(estimate_homography(&src, &src, 1.0).is_none());

    let same = vec![(5.0, 5.0); 6];
    assert!(estimate_homography(&same, &same, 1.0).is_none());
}
