//! Fork-join evaluation of independent subtrees on the rayon pool.
//!
//! A compound node forks only when both children carry at least
//! `threshold` leaves and the fork depth is below [`max_fork_depth`];
//! everything else falls back to the sequential work-stack walk. Recursion
//! is bounded by the fork depth, not the tree depth, and results match the
//! sequential walk exactly, including which error is reported first.

use crate::matrix::CoordMatrix;
use crate::model::Model;

use super::error::{SeparabilityError, Shape};
use super::{check_size, combine_node, compose, eval_subtree};

/// Same result as [`super::coord_matrix`], with large sibling subtrees
/// evaluated concurrently.
pub fn coord_matrix_par(model: &Model, threshold: usize) -> Result<CoordMatrix, SeparabilityError> {
    tracing::debug!(
        leaves = model.leaf_count(),
        threshold,
        threads = rayon::current_num_threads(),
        "parallel evaluation"
    );
    eval_forked(model, model, threshold.max(1), max_fork_depth())
}

/// Nested forks allowed below the root. Two levels per doubling of the
/// pool keeps every worker busy on unbalanced trees.
fn max_fork_depth() -> usize {
    let threads = rayon::current_num_threads().max(1);
    2 * (usize::BITS - threads.leading_zeros()) as usize + 4
}

fn eval_forked(
    root: &Model,
    node: &Model,
    threshold: usize,
    forks_left: usize,
) -> Result<CoordMatrix, SeparabilityError> {
    let Some((left, right)) = node.children() else {
        return eval_subtree(root, node);
    };
    if forks_left == 0 || left.leaf_count() < threshold || right.leaf_count() < threshold {
        return eval_subtree(root, node);
    }

    // same pre-order checks as the sequential walk, so errors agree
    check_size(root, node)?;
    if let Some(op) = node.operator() {
        compose::check_operands(op, Shape::of(left), Shape::of(right))
            .map_err(|m| SeparabilityError::mismatch(root, node, m))?;
    }

    let (left_matrix, right_matrix) = rayon::join(
        || eval_forked(root, left, threshold, forks_left - 1),
        || eval_forked(root, right, threshold, forks_left - 1),
    );
    // left first: the sequential walk would have failed there before
    // reaching the right subtree
    let left_matrix = left_matrix?;
    let right_matrix = right_matrix?;
    combine_node(root, node, &left_matrix, &right_matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separable::coord_matrix;

    fn balanced(depth: usize, counter: &mut usize) -> Model {
        if depth == 0 {
            *counter += 1;
            return if *counter % 3 == 0 {
                Model::inseparable("Rotation2D", 2, 2)
            } else {
                Model::separable("Shift", 1)
            };
        }
        let left = balanced(depth - 1, counter);
        let right = balanced(depth - 1, counter);
        if depth % 2 == 0 {
            left & right
        } else {
            let n = left.n_inputs() + right.n_inputs();
            (left & right) | Model::identity(n)
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let model = balanced(7, &mut 0);
        let sequential = coord_matrix(&model).unwrap();
        for threshold in [1, 2, 8, 64, 1_000] {
            assert_eq!(coord_matrix_par(&model, threshold).unwrap(), sequential);
        }
    }

    #[test]
    fn test_parallel_reports_same_error() {
        let good = balanced(4, &mut 0);
        let bad = Model::inseparable("L", 2, 2) | Model::inseparable("R", 3, 1);
        let right = balanced(4, &mut 0) & bad;
        let model = good & right;
        let sequential = coord_matrix(&model).unwrap_err();
        let parallel = coord_matrix_par(&model, 1).unwrap_err();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.path().to_string(), "root.right.right");
    }

    #[test]
    fn test_deep_tree_stays_within_fork_depth() {
        // every level forks on leaf count alone; only the depth cap stops it
        let chunk = || (1..8).fold(Model::separable("s", 1), |acc, _| acc + Model::separable("s", 1));
        let deep = (1..20_000).fold(chunk(), |acc, _| acc + chunk());
        assert_eq!(coord_matrix_par(&deep, 8).unwrap(), coord_matrix(&deep).unwrap());

        let thin = (1..100_000).fold(Model::separable("s", 1), |acc, _| acc + Model::separable("s", 1));
        assert!(coord_matrix_par(&thin, 1).unwrap().is_identity());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let model = Model::separable("a", 1) & Model::separable("b", 1);
        assert!(coord_matrix_par(&model, 0).unwrap().is_identity());
    }
}
