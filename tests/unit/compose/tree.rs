use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::align::aligner::{AlignOutcome, FixedAligner};
use crate::align::homography::Homography;
use crate::align::pair::{AlignmentFailure, FailureKind, PairState};
use crate::foundation::core::SourceTag;

fn feed(idx: usize, w: u32, h: u32) -> Frame {
    let data = (0..w * h * 3).map(|i| ((i as usize * 7 + idx * 31) % 251) as u8).collect();
    Frame::new(w, h, data, SourceTag::Feed(idx)).unwrap()
}

fn shift_right(frame_width: u32) -> Box<dyn ImageAligner> {
    Box::new(FixedAligner::new(Homography::translation(
        f64::from(frame_width),
        0.0,
    )))
}

/// Reports insufficient matches for one node and a translation for the others.
struct NodeGate {
    failing: usize,
    node: usize,
    calls: Arc<AtomicUsize>,
}

impl ImageAligner for NodeGate {
    fn match_frames(
        &mut self,
        reference: &Frame,
        _incoming: &Frame,
        _params: &AlignParams,
    ) -> StitchResult<AlignOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.node == self.failing {
            return Ok(AlignOutcome::InsufficientMatches {
                good: 3,
                required: 20,
            });
        }
        Ok(AlignOutcome::Homography(Homography::translation(
            f64::from(reference.width()),
            0.0,
        )))
    }
}

#[test]
fn node_count_follows_input_count() {
    for (inputs, nodes) in [(1, 0), (2, 1), (3, 2), (4, 3)] {
        let tree = CompositionTree::new(inputs, |_| shift_right(4), AlignParams::default()).unwrap();
        assert_eq!(tree.inputs(), inputs);
        assert_eq!(tree.nodes().len(), nodes);
        assert_eq!(CompositionTree::node_count(inputs), nodes);
    }
}

#[test]
fn unsupported_input_counts_are_rejected() {
    for inputs in [0, 5] {
        assert!(matches!(
            CompositionTree::new(inputs, |_| shift_right(4), AlignParams::default()),
            Err(StitchError::Validation(_))
        ));
    }
}

#[test]
fn single_input_is_identity() {
    let mut tree = CompositionTree::new(1, |_| shift_right(4), AlignParams::default()).unwrap();
    let f0 = feed(0, 4, 3);
    let out = tree.merge(vec![f0.clone()]).unwrap();
    assert_eq!(out, StitchOutcome::Composite(f0));
}

#[test]
fn frame_count_mismatch_is_a_validation_error() {
    let mut tree = CompositionTree::new(2, |_| shift_right(4), AlignParams::default()).unwrap();
    assert!(matches!(
        tree.merge(vec![feed(0, 4, 3)]),
        Err(StitchError::Validation(_))
    ));
}

#[test]
fn three_inputs_chain_left_to_right() {
    let mut tree = CompositionTree::new(
        3,
        |node| shift_right(if node == 0 { 4 } else { 8 }),
        AlignParams::default(),
    )
    .unwrap();
    let (f0, f1, f2) = (feed(0, 4, 3), feed(1, 4, 3), feed(2, 4, 3));
    let out = tree
        .merge(vec![f0.clone(), f1.clone(), f2.clone()])
        .unwrap()
        .composite()
        .unwrap();
    assert_eq!(out.width(), 12);
    assert_eq!(out.height(), 3);
    for y in 0..3 {
        for x in 0..4 {
            assert_eq!(out.pixel(x, y), f0.pixel(x, y));
            assert_eq!(out.pixel(x + 4, y), f1.pixel(x, y));
            assert_eq!(out.pixel(x + 8, y), f2.pixel(x, y));
        }
    }
}

#[test]
fn four_inputs_equal_combine_of_two_pairs() {
    let params = AlignParams::default();
    let frames = vec![feed(0, 4, 3), feed(1, 4, 3), feed(2, 4, 3), feed(3, 4, 3)];

    let mut tree = CompositionTree::new(
        4,
        |node| shift_right(if node == 2 { 8 } else { 4 }),
        params,
    )
    .unwrap();
    let merged = tree.merge(frames.clone()).unwrap().composite().unwrap();

    let mut a = PairAligner::new(0, shift_right(4), params);
    let mut b = PairAligner::new(1, shift_right(4), params);
    let mut c = PairAligner::new(2, shift_right(8), params);
    let left = a.align(&frames[0], &frames[1]).unwrap().composite().unwrap();
    let right = b.align(&frames[2], &frames[3]).unwrap().composite().unwrap();
    let expected = c.align(&left, &right).unwrap().composite().unwrap();

    assert_eq!(merged, expected);
    assert_eq!(merged.width(), 16);
}

#[test]
fn failing_node_short_circuits_the_merge() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut tree = CompositionTree::new(
        3,
        |node| {
            Box::new(NodeGate {
                failing: 0,
                node,
                calls: Arc::clone(&calls),
            })
        },
        AlignParams::default(),
    )
    .unwrap();

    let out = tree
        .merge(vec![feed(0, 4, 3), feed(1, 4, 3), feed(2, 4, 3)])
        .unwrap();
    assert_eq!(
        out,
        StitchOutcome::Skipped(AlignmentFailure {
            node: 0,
            kind: FailureKind::InsufficientMatches {
                good: 3,
                required: 20
            },
        })
    );
    // Node 1 was never consulted.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(tree.nodes().iter().all(|n| n.state() == PairState::Empty));
}

#[test]
fn failing_half_skips_the_final_combine() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut tree = CompositionTree::new(
        4,
        |node| {
            Box::new(NodeGate {
                failing: 1,
                node,
                calls: Arc::clone(&calls),
            })
        },
        AlignParams::default(),
    )
    .unwrap();

    let out = tree
        .merge(vec![feed(0, 4, 3), feed(1, 4, 3), feed(2, 4, 3), feed(3, 4, 3)])
        .unwrap();
    assert!(matches!(
        out,
        StitchOutcome::Skipped(AlignmentFailure { node: 1, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(tree.nodes()[0].state(), PairState::Ready);
    assert_eq!(tree.nodes()[2].state(), PairState::Empty);
}

#[test]
fn reset_clears_every_node() {
    let mut tree = CompositionTree::new(4, |_| shift_right(4), AlignParams::default()).unwrap();
    tree.merge(vec![feed(0, 4, 3), feed(1, 4, 3), feed(2, 4, 3), feed(3, 4, 3)])
        .unwrap();
    assert!(tree.nodes().iter().all(|n| n.state() == PairState::Ready));
    tree.reset();
    assert!(tree.nodes().iter().all(|n| n.state() == PairState::Empty));
}
