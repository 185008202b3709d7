//! Separability analysis of model trees.
//!
//! The matrix of a node is built from its children's matrices only, so the
//! evaluation is a post-order walk. It runs on an explicit work stack and
//! never recurses, whatever the depth of the tree.

pub mod compose;
pub mod error;
mod parallel;

use serde::{Deserialize, Serialize};

use crate::matrix::CoordMatrix;
use crate::model::leaf;
use crate::model::{Model, ModelKind, MAX_ARITY};

pub use error::{Branch, NodePath, SeparabilityError, Shape, ShapeMismatch};
pub use parallel::coord_matrix_par;

/// Evaluation settings, read from the `[engine]` section of the config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalOptions {
    /// Evaluate large independent subtrees on the rayon pool.
    pub parallel: bool,
    /// Both children must have at least this many leaves before forking.
    pub parallel_threshold: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            parallel_threshold: 64,
        }
    }
}

/// Matrix plus per-output verdicts for one model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeparabilityReport {
    pub n_inputs: usize,
    pub n_outputs: usize,
    pub matrix: CoordMatrix,
    /// `separable[i]`: output `i` depends on exactly one input.
    pub separable: Vec<bool>,
}

impl SeparabilityReport {
    pub fn is_fully_separable(&self) -> bool {
        self.separable.iter().all(|&s| s)
    }
}

/// Raw dependency matrix of `model`, shape `(n_outputs, n_inputs)`.
pub fn coord_matrix(model: &Model) -> Result<CoordMatrix, SeparabilityError> {
    eval_subtree(model, model)
}

/// Dependency matrix for a model. A single-input model with several
/// outputs reports every output as depending on that input.
pub fn separability_matrix(model: &Model) -> Result<CoordMatrix, SeparabilityError> {
    separability_matrix_with(model, &EvalOptions::default())
}

pub fn separability_matrix_with(
    model: &Model,
    options: &EvalOptions,
) -> Result<CoordMatrix, SeparabilityError> {
    let matrix = if options.parallel {
        coord_matrix_par(model, options.parallel_threshold)?
    } else {
        coord_matrix(model)?
    };
    if fans_out_single_input(model) {
        return Ok(CoordMatrix::full(model.n_outputs(), model.n_inputs()));
    }
    Ok(matrix)
}

/// Per output: `true` when it depends on exactly one input. A model
/// with one input and several outputs is never separable.
pub fn is_separable(model: &Model) -> Result<Vec<bool>, SeparabilityError> {
    Ok(analyze(model, &EvalOptions::default())?.separable)
}

/// Build the full report for `model`.
pub fn analyze(
    model: &Model,
    options: &EvalOptions,
) -> Result<SeparabilityReport, SeparabilityError> {
    let matrix = separability_matrix_with(model, options)?;
    let separable = if fans_out_single_input(model) {
        vec![false; model.n_outputs()]
    } else {
        matrix.row_counts().into_iter().map(|c| c == 1).collect()
    };
    tracing::debug!(
        inputs = model.n_inputs(),
        outputs = model.n_outputs(),
        leaves = model.leaf_count(),
        separable = separable.iter().filter(|&&s| s).count(),
        "analyzed model"
    );
    Ok(SeparabilityReport {
        n_inputs: model.n_inputs(),
        n_outputs: model.n_outputs(),
        matrix,
        separable,
    })
}

fn fans_out_single_input(model: &Model) -> bool {
    model.n_inputs() == 1 && model.n_outputs() > 1
}

/// Post-order evaluation of `node` without recursion. `root` is only used
/// to locate failing nodes for error reports.
pub(crate) fn eval_subtree(root: &Model, node: &Model) -> Result<CoordMatrix, SeparabilityError> {
    enum Task<'a> {
        Visit(&'a Model),
        Combine(&'a Model),
    }

    let mut tasks = vec![Task::Visit(node)];
    let mut resolved: Vec<CoordMatrix> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(current) => match current.kind() {
                ModelKind::Leaf(_) => resolved.push(leaf_matrix(root, current)?),
                ModelKind::Compound { left, right, op } => {
                    // operands are checked from arity before any matrix work
                    check_size(root, current)?;
                    compose::check_operands(*op, Shape::of(left), Shape::of(right))
                        .map_err(|m| SeparabilityError::mismatch(root, current, m))?;
                    tasks.push(Task::Combine(current));
                    tasks.push(Task::Visit(right));
                    tasks.push(Task::Visit(left));
                }
            },
            Task::Combine(current) => {
                let (right, left) = match (resolved.pop(), resolved.pop()) {
                    (Some(r), Some(l)) => (r, l),
                    _ => unreachable!("compound node resolved before its children"),
                };
                resolved.push(combine_node(root, current, &left, &right)?);
            }
        }
    }

    match resolved.pop() {
        Some(matrix) if resolved.is_empty() => Ok(matrix),
        _ => unreachable!("evaluation must leave exactly one matrix"),
    }
}

/// Compound shapes are bounded like leaves before their matrix is
/// allocated.
pub(crate) fn check_size(root: &Model, node: &Model) -> Result<(), SeparabilityError> {
    if node.n_inputs() > MAX_ARITY || node.n_outputs() > MAX_ARITY {
        return Err(SeparabilityError::too_large(root, node));
    }
    Ok(())
}

pub(crate) fn leaf_matrix(root: &Model, node: &Model) -> Result<CoordMatrix, SeparabilityError> {
    let ModelKind::Leaf(kind) = node.kind() else {
        unreachable!("leaf_matrix called on a compound node")
    };
    let matrix = leaf::coord_matrix(kind, node.n_inputs(), node.n_outputs())
        .map_err(|defect| SeparabilityError::invalid_leaf(root, node, defect))?;
    tracing::trace!(leaf = node.name(), shape = ?matrix.shape(), "resolved leaf");
    Ok(matrix)
}

pub(crate) fn combine_node(
    root: &Model,
    node: &Model,
    left: &CoordMatrix,
    right: &CoordMatrix,
) -> Result<CoordMatrix, SeparabilityError> {
    let Some(op) = node.operator() else {
        unreachable!("combine_node called on a leaf")
    };
    let matrix = compose::combine(op, left, right)
        .map_err(|m| SeparabilityError::mismatch(root, node, m))?;
    debug_assert_eq!(matrix.shape(), (node.n_outputs(), node.n_inputs()));
    debug_assert!(matrix.rows_all_nonempty());
    tracing::trace!(op = op.family(), shape = ?matrix.shape(), "resolved compound");
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArithOp;

    const T: bool = true;
    const F: bool = false;

    fn sep(name: &str) -> Model {
        Model::separable(name, 1)
    }

    fn rot() -> Model {
        Model::inseparable("Rotation2D", 2, 2)
    }

    fn rows(m: &CoordMatrix) -> Vec<Vec<bool>> {
        m.to_rows()
    }

    #[test]
    fn test_stack_of_separable_leaves_is_identity() {
        let m = separability_matrix(&(Model::separable("A", 2) & Model::separable("B", 3))).unwrap();
        assert!(m.is_identity());
        assert_eq!(m.shape(), (5, 5));
    }

    #[test]
    fn test_nested_right_stack_keeps_its_diagonal() {
        let right = sep("sh1") & sep("sh2");
        let right_matrix = separability_matrix(&right).unwrap();
        assert!(right_matrix.is_identity());

        let model = Model::inseparable("Pix2Sky_TAN", 2, 2) & right;
        let m = separability_matrix(&model).unwrap();
        assert_eq!(m.block(2, 2, 2, 2), right_matrix);
        assert_eq!(rows(&m.block(2, 2, 2, 2)), vec![vec![T, F], vec![F, T]]);
    }

    #[test]
    fn test_nesting_invariance() {
        let expected = vec![
            vec![T, T, F, F],
            vec![T, T, F, F],
            vec![F, F, T, F],
            vec![F, F, F, T],
        ];
        let nested_right = rot() & (sep("b") & sep("c"));
        let nested_left = (rot() & sep("b")) & sep("c");
        let flat = Model::stack_all(vec![rot(), sep("b"), sep("c")]).unwrap();
        for model in [nested_right, nested_left, flat] {
            assert_eq!(rows(&separability_matrix(&model).unwrap()), expected, "{}", model);
        }
    }

    #[test]
    fn test_chain_transitivity() {
        let m = separability_matrix(&(Model::separable("L", 2) | rot())).unwrap();
        assert_eq!(m, CoordMatrix::full(2, 2));
    }

    #[test]
    fn test_arithmetic_union() {
        let id = || Model::separable("Scale", 2);
        assert!(separability_matrix(&(id() + id())).unwrap().is_identity());
        assert_eq!(
            separability_matrix(&(id() - rot())).unwrap(),
            CoordMatrix::full(2, 2)
        );
    }

    #[test]
    fn test_chain_mismatch_is_reported() {
        let model = Model::inseparable("L", 2, 2) | Model::inseparable("R", 3, 1);
        let err = separability_matrix(&model).unwrap_err();
        match err {
            SeparabilityError::StructuralMismatch { path, mismatch, .. } => {
                assert!(path.is_root());
                assert_eq!(mismatch.left, Shape::new(2, 2));
                assert_eq!(mismatch.right, Shape::new(1, 3));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatch_deep_in_tree_has_path() {
        let bad = Model::separable("A", 2) + Model::inseparable("B", 3, 2);
        let model = sep("s") & (sep("t") & bad);
        let err = separability_matrix(&model).unwrap_err();
        assert_eq!(err.path().to_string(), "root.right.right");
        assert!(err.to_string().contains("'+' needs operands of the same shape"));
    }

    #[test]
    fn test_invalid_leaf_is_reported() {
        let model = rot() & Model::leaf("Bad", 1, 2, true);
        let err = separability_matrix(&model).unwrap_err();
        match err {
            SeparabilityError::InvalidLeaf { path, name, .. } => {
                assert_eq!(path.to_string(), "root.right");
                assert_eq!(name, "Bad");
            }
            other => panic!("expected invalid leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_mapping_then_rotation() {
        // map2 | rot & scl1
        let model = Model::mapping(vec![0, 0, 1], None) | (rot() & sep("scl1"));
        let m = separability_matrix(&model).unwrap();
        assert_eq!(rows(&m), vec![vec![T, F], vec![T, F], vec![F, T]]);
        // each output reads a single input, even though two share it
        assert_eq!(is_separable(&model).unwrap(), vec![T, T, T]);
    }

    #[test]
    fn test_single_input_fan_out() {
        let model = Model::mapping(vec![0, 0], None) | (sep("sh1") & sep("sh2"));
        let report = analyze(&model, &EvalOptions::default()).unwrap();
        assert_eq!(report.matrix, CoordMatrix::full(2, 1));
        assert_eq!(report.separable, vec![F, F]);
        assert!(!report.is_fully_separable());
    }

    #[test]
    fn test_power_is_arithmetic() {
        let model = Model::arithmetic(ArithOp::Pow, sep("a"), sep("b"));
        assert!(separability_matrix(&model).unwrap().is_identity());
    }

    #[test]
    fn test_explicit_leaf_inside_stack() {
        let lookup = CoordMatrix::from_rows(&[[T, F], [T, T]]).unwrap();
        let model = Model::explicit("Lookup", lookup) & sep("s");
        let m = separability_matrix(&model).unwrap();
        assert_eq!(
            rows(&m),
            vec![vec![T, F, F], vec![T, T, F], vec![F, F, T]]
        );
        assert_eq!(is_separable(&model).unwrap(), vec![T, F, T]);
    }

    #[test]
    fn test_oversized_stack_is_rejected() {
        let half = Model::separable("Wide", MAX_ARITY / 2 + 1);
        let model = sep("s") & (half.clone() & half);
        match separability_matrix(&model).unwrap_err() {
            SeparabilityError::TooLarge { path, shape, .. } => {
                assert_eq!(path.to_string(), "root");
                assert_eq!(shape.n_inputs, MAX_ARITY + 3);
            }
            other => panic!("expected too large, got {:?}", other),
        }
    }

    #[test]
    fn test_saturated_arity_is_rejected() {
        let huge = Model::inseparable("Huge", usize::MAX, 1);
        let err = separability_matrix(&(huge.clone() & huge)).unwrap_err();
        assert!(matches!(err, SeparabilityError::TooLarge { .. }), "{:?}", err);
    }

    #[test]
    fn test_deep_left_leaning_stack() {
        let deep = (1..1_500).fold(sep("s0"), |acc, _| acc & sep("s"));
        assert_eq!(deep.depth(), 1_499);
        let m = coord_matrix(&deep).unwrap();
        assert_eq!(m.shape(), (1_500, 1_500));
        assert_eq!(m.count_true(), 1_500);
        assert!(m.is_identity());
    }

    #[test]
    fn test_deep_right_leaning_stack() {
        let deep = (1..1_000).fold(sep("s0"), |acc, _| sep("s") & acc);
        assert!(coord_matrix(&deep).unwrap().is_identity());
    }
}
