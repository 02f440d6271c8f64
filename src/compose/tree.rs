use crate::align::aligner::{AlignParams, ImageAligner};
use crate::align::pair::{PairAligner, StitchOutcome};
use crate::foundation::core::Frame;
use crate::foundation::error::{StitchError, StitchResult};

/// Largest number of sources a tree can merge.
pub const MAX_INPUTS: usize = 4;

/// Merge order for 1..=4 sources, owning one [`PairAligner`] per merge node.
///
/// | inputs | nodes | merge                          |
/// |--------|-------|--------------------------------|
/// | 1      | 0     | `f0`                           |
/// | 2      | 1     | `A(f0, f1)`                    |
/// | 3      | 2     | `B(A(f0, f1), f2)`             |
/// | 4      | 3     | `C(A(f0, f1), B(f2, f3))`      |
///
/// The shape is fixed at construction; a different source count needs a new tree.
pub struct CompositionTree {
    inputs: usize,
    nodes: Vec<PairAligner>,
}

impl CompositionTree {
    /// Build a tree for `inputs` sources. `make_aligner` is called once per merge node with the
    /// node index.
    pub fn new(
        inputs: usize,
        mut make_aligner: impl FnMut(usize) -> Box<dyn ImageAligner>,
        params: AlignParams,
    ) -> StitchResult<Self> {
        if !(1..=MAX_INPUTS).contains(&inputs) {
            return Err(StitchError::validation(format!(
                "composition tree supports 1..={MAX_INPUTS} inputs, got {inputs}"
            )));
        }
        let nodes = (0..Self::node_count(inputs))
            .map(|node| PairAligner::new(node, make_aligner(node), params))
            .collect();
        Ok(Self { inputs, nodes })
    }

    /// Number of merge nodes a tree over `inputs` sources has.
    pub fn node_count(inputs: usize) -> usize {
        inputs.saturating_sub(1)
    }

    /// Number of frames `merge` expects.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// The merge nodes, in index order.
    pub fn nodes(&self) -> &[PairAligner] {
        &self.nodes
    }

    /// Clear every node's cached homography.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }

    /// Merge one cycle's frames, given in feed order.
    ///
    /// The first alignment failure short-circuits and partial composites are dropped.
    #[tracing::instrument(level = "debug", skip_all, fields(inputs = self.inputs))]
    pub fn merge(&mut self, frames: Vec<Frame>) -> StitchResult<StitchOutcome> {
        if frames.len() != self.inputs {
            return Err(StitchError::validation(format!(
                "expected {} frames, got {}",
                self.inputs,
                frames.len()
            )));
        }

        let (inputs, node_count) = (self.inputs, self.nodes.len());
        match (self.nodes.as_mut_slice(), frames.as_slice()) {
            ([], [f0]) => Ok(StitchOutcome::Composite(f0.clone())),
            ([a], [f0, f1]) => a.align(f0, f1),
            ([a, b], [f0, f1, f2]) => {
                let left = match a.align(f0, f1)? {
                    StitchOutcome::Composite(f) => f,
                    skipped => return Ok(skipped),
                };
                b.align(&left, f2)
            }
            ([a, b, c], [f0, f1, f2, f3]) => {
                let (left, right) = rayon::join(|| a.align(f0, f1), || b.align(f2, f3));
                let left = match left? {
                    StitchOutcome::Composite(f) => f,
                    skipped => return Ok(skipped),
                };
                let right = match right? {
                    StitchOutcome::Composite(f) => f,
                    skipped => return Ok(skipped),
                };
                c.align(&left, &right)
            }
            _ => Err(StitchError::validation(format!(
                "tree over {inputs} inputs has {node_count} nodes"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/tree.rs"]
mod tests;
