//! Intrinsic separability of leaf models.

use std::fmt;

use crate::matrix::CoordMatrix;

use super::MAX_ARITY;

/// What a leaf declares about its own output/input dependencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafKind {
    /// Output `i` depends on input `i` only. Requires a square arity.
    Separable,
    /// Every output depends on every input.
    Inseparable,
    /// Output `i` copies input `indices[i]`.
    Mapping(Vec<usize>),
    /// The leaf supplies its matrix directly.
    Explicit(CoordMatrix),
}

/// Why a leaf's declaration cannot produce a matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafDefect {
    ZeroArity {
        n_inputs: usize,
        n_outputs: usize,
    },
    SeparableNotSquare {
        n_inputs: usize,
        n_outputs: usize,
    },
    TooLarge {
        n_inputs: usize,
        n_outputs: usize,
    },
    MappingLength {
        indices: usize,
        n_outputs: usize,
    },
    MappingIndexOutOfRange {
        output: usize,
        index: usize,
        n_inputs: usize,
    },
    MatrixShape {
        declared: (usize, usize),
        matrix: (usize, usize),
    },
    EmptyRow {
        output: usize,
    },
}

impl fmt::Display for LeafDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafDefect::ZeroArity {
                n_inputs,
                n_outputs,
            } => write!(
                f,
                "a leaf needs at least one input and one output, found {} inputs and {} outputs",
                n_inputs, n_outputs
            ),
            LeafDefect::SeparableNotSquare {
                n_inputs,
                n_outputs,
            } => write!(
                f,
                "a separable leaf must have as many outputs as inputs, found {} inputs and {} outputs",
                n_inputs, n_outputs
            ),
            LeafDefect::TooLarge {
                n_inputs,
                n_outputs,
            } => write!(
                f,
                "{} inputs and {} outputs exceed the limit of {} per side",
                n_inputs, n_outputs, MAX_ARITY
            ),
            LeafDefect::MappingLength { indices, n_outputs } => write!(
                f,
                "mapping lists {} indices but declares {} outputs",
                indices, n_outputs
            ),
            LeafDefect::MappingIndexOutOfRange {
                output,
                index,
                n_inputs,
            } => write!(
                f,
                "output {} maps to input {}, but the mapping only has {} inputs",
                output, index, n_inputs
            ),
            LeafDefect::MatrixShape { declared, matrix } => write!(
                f,
                "declared shape is {}x{} (outputs x inputs) but the matrix is {}x{}",
                declared.0, declared.1, matrix.0, matrix.1
            ),
            LeafDefect::EmptyRow { output } => {
                write!(f, "output {} depends on no input", output)
            }
        }
    }
}

/// Dependency matrix of a leaf, shape `(n_outputs, n_inputs)`.
pub fn coord_matrix(
    kind: &LeafKind,
    n_inputs: usize,
    n_outputs: usize,
) -> Result<CoordMatrix, LeafDefect> {
    if n_outputs == 0 || (n_inputs == 0 && !matches!(kind, LeafKind::Mapping(_))) {
        return Err(LeafDefect::ZeroArity {
            n_inputs,
            n_outputs,
        });
    }

    if n_inputs > MAX_ARITY || n_outputs > MAX_ARITY {
        return Err(LeafDefect::TooLarge {
            n_inputs,
            n_outputs,
        });
    }

    match kind {
        LeafKind::Separable => {
            if n_inputs != n_outputs {
                return Err(LeafDefect::SeparableNotSquare {
                    n_inputs,
                    n_outputs,
                });
            }
            Ok(CoordMatrix::identity(n_inputs))
        }
        LeafKind::Inseparable => Ok(CoordMatrix::full(n_outputs, n_inputs)),
        LeafKind::Mapping(indices) => {
            if indices.len() != n_outputs {
                return Err(LeafDefect::MappingLength {
                    indices: indices.len(),
                    n_outputs,
                });
            }
            let mut m = CoordMatrix::zeros(n_outputs, n_inputs);
            for (output, &index) in indices.iter().enumerate() {
                if index >= n_inputs {
                    return Err(LeafDefect::MappingIndexOutOfRange {
                        output,
                        index,
                        n_inputs,
                    });
                }
                m.set(output, index, true);
            }
            Ok(m)
        }
        LeafKind::Explicit(matrix) => {
            if matrix.shape() != (n_outputs, n_inputs) {
                return Err(LeafDefect::MatrixShape {
                    declared: (n_outputs, n_inputs),
                    matrix: matrix.shape(),
                });
            }
            if let Some(output) = matrix.row_counts().iter().position(|&c| c == 0) {
                return Err(LeafDefect::EmptyRow { output });
            }
            Ok(matrix.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: bool = true;
    const F: bool = false;

    #[test]
    fn test_separable_is_identity() {
        let m = coord_matrix(&LeafKind::Separable, 3, 3).unwrap();
        assert!(m.is_identity());
    }

    #[test]
    fn test_inseparable_is_full() {
        let m = coord_matrix(&LeafKind::Inseparable, 2, 1).unwrap();
        assert_eq!(m, CoordMatrix::full(1, 2));
    }

    #[test]
    fn test_separable_requires_square() {
        assert_eq!(
            coord_matrix(&LeafKind::Separable, 1, 2),
            Err(LeafDefect::SeparableNotSquare {
                n_inputs: 1,
                n_outputs: 2
            })
        );
    }

    #[test]
    fn test_zero_arity_rejected() {
        assert!(matches!(
            coord_matrix(&LeafKind::Inseparable, 0, 2),
            Err(LeafDefect::ZeroArity { .. })
        ));
        assert!(matches!(
            coord_matrix(&LeafKind::Separable, 0, 0),
            Err(LeafDefect::ZeroArity { .. })
        ));
    }

    #[test]
    fn test_oversized_leaf_rejected_before_allocation() {
        assert!(matches!(
            coord_matrix(&LeafKind::Inseparable, usize::MAX, usize::MAX - 1),
            Err(LeafDefect::TooLarge { .. })
        ));
        assert!(matches!(
            coord_matrix(&LeafKind::Mapping(vec![MAX_ARITY]), MAX_ARITY + 1, 1),
            Err(LeafDefect::TooLarge { .. })
        ));
        assert!(coord_matrix(&LeafKind::Separable, MAX_ARITY, MAX_ARITY).is_ok());
    }

    #[test]
    fn test_mapping_routes_inputs() {
        let m = coord_matrix(&LeafKind::Mapping(vec![0, 0, 1]), 2, 3).unwrap();
        assert_eq!(m.to_rows(), vec![vec![T, F], vec![T, F], vec![F, T]]);
    }

    #[test]
    fn test_mapping_may_ignore_inputs() {
        let m = coord_matrix(&LeafKind::Mapping(vec![2]), 3, 1).unwrap();
        assert_eq!(m.to_rows(), vec![vec![F, F, T]]);
    }

    #[test]
    fn test_mapping_index_out_of_range() {
        assert_eq!(
            coord_matrix(&LeafKind::Mapping(vec![0, 3]), 2, 2),
            Err(LeafDefect::MappingIndexOutOfRange {
                output: 1,
                index: 3,
                n_inputs: 2
            })
        );
    }

    #[test]
    fn test_explicit_shape_checked() {
        let lookup = CoordMatrix::from_rows(&[[T, F], [T, T]]).unwrap();
        assert_eq!(
            coord_matrix(&LeafKind::Explicit(lookup.clone()), 2, 2),
            Ok(lookup.clone())
        );
        assert!(matches!(
            coord_matrix(&LeafKind::Explicit(lookup), 3, 2),
            Err(LeafDefect::MatrixShape { .. })
        ));
    }

    #[test]
    fn test_explicit_empty_row_rejected() {
        let m = CoordMatrix::from_rows(&[[T, F], [F, F]]).unwrap();
        assert_eq!(
            coord_matrix(&LeafKind::Explicit(m), 2, 2),
            Err(LeafDefect::EmptyRow { output: 1 })
        );
    }

    #[test]
    fn test_defect_messages() {
        let d = LeafDefect::SeparableNotSquare {
            n_inputs: 1,
            n_outputs: 2,
        };
        assert!(d.to_string().contains("found 1 inputs and 2 outputs"));
    }
}
