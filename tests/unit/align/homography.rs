use super::*;

#[test]
fn new_normalizes_by_bottom_right() {
    let h = Homography::from_row_major([2.0, 0.0, 4.0, 0.0, 2.0, 6.0, 0.0, 0.0, 2.0]).unwrap();
    assert_eq!(h, Homography::translation(2.0, 3.0));
}

#[test]
fn singular_and_non_finite_are_rejected() {
    assert!(Homography::from_row_major([0.0; 9]).is_err());
    assert!(Homography::from_row_major([1.0, 0.0, f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).is_err());
}

#[test]
fn project_and_inverse_round_trip_a_point() {
    let h = Homography::from_row_major([1.1, 0.05, 12.0, -0.02, 0.95, 3.0, 1e-4, 0.0, 1.0]).unwrap();
    let (x, y) = h.project(40.0, 25.0).unwrap();
    let (bx, by) = h.inverse().unwrap().project(x, y).unwrap();
    assert!((bx - 40.0).abs() < 1e-9);
    assert!((by - 25.0).abs() < 1e-9);
}

#[test]
fn then_applies_self_first() {
    let scale = Homography::from_row_major([2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
    let shift = Homography::translation(5.0, 0.0);
    assert_eq!(scale.then(&shift).project(1.0, 1.0), Some((7.0, 2.0)));
    assert_eq!(shift.then(&scale).project(1.0, 1.0), Some((12.0, 2.0)));
}

#[test]
fn points_on_the_horizon_do_not_project() {
    let h = Homography::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0, 1.0]).unwrap();
    assert_eq!(h.project(1.0, 0.0), None);
}
