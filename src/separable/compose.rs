//! Matrix combination rules, one per operator family.
//!
//! Each rule reads only its two operand matrices and returns a freshly
//! allocated result; operands are never modified.

use crate::matrix::CoordMatrix;
use crate::model::{ArithOp, Operator};

use super::error::{Shape, ShapeMismatch};

fn shape_of(m: &CoordMatrix) -> Shape {
    Shape::new(m.n_rows(), m.n_cols())
}

/// `&`: block-diagonal join. `left` fills the top-left block, `right` the
/// bottom-right block, copied cell by cell. Nothing crosses between blocks.
pub fn cstack(left: &CoordMatrix, right: &CoordMatrix) -> CoordMatrix {
    let (lo, li) = left.shape();
    let (ro, ri) = right.shape();
    let mut out = CoordMatrix::zeros(lo + ro, li + ri);
    out.write_block(0, 0, left);
    out.write_block(lo, li, right);
    out
}

/// `|`: boolean product over (OR, AND). Output `i` depends on input `j`
/// when some intermediate coordinate `k` links them:
/// `out[i][j] = OR_k right[i][k] AND left[k][j]`.
pub fn cdot(left: &CoordMatrix, right: &CoordMatrix) -> Result<CoordMatrix, ShapeMismatch> {
    if left.n_rows() != right.n_cols() {
        return Err(ShapeMismatch {
            op: Operator::Chain,
            left: shape_of(left),
            right: shape_of(right),
        });
    }

    let mut out = CoordMatrix::zeros(right.n_rows(), left.n_cols());
    for i in 0..right.n_rows() {
        let through = right.row(i);
        for k in (0..through.len()).filter(|&k| through[k]) {
            let from = left.row(k);
            for j in (0..from.len()).filter(|&j| from[j]) {
                out.set(i, j, true);
            }
        }
    }
    Ok(out)
}

/// `+ - * / **`: elementwise union. Either operand's dependency carries
/// through, since the arithmetic itself can mix both.
pub fn arith(
    op: ArithOp,
    left: &CoordMatrix,
    right: &CoordMatrix,
) -> Result<CoordMatrix, ShapeMismatch> {
    if left.shape() != right.shape() {
        return Err(ShapeMismatch {
            op: Operator::Arithmetic(op),
            left: shape_of(left),
            right: shape_of(right),
        });
    }

    let (rows, cols) = left.shape();
    let mut out = CoordMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            out.set(i, j, left.get(i, j) || right.get(i, j));
        }
    }
    Ok(out)
}

/// Apply the rule for `op`.
pub fn combine(
    op: Operator,
    left: &CoordMatrix,
    right: &CoordMatrix,
) -> Result<CoordMatrix, ShapeMismatch> {
    match op {
        Operator::Stack => Ok(cstack(left, right)),
        Operator::Chain => cdot(left, right),
        Operator::Arithmetic(arith_op) => arith(arith_op, left, right),
    }
}

/// Operand compatibility from arity alone, before any matrix is built.
pub fn check_operands(op: Operator, left: Shape, right: Shape) -> Result<(), ShapeMismatch> {
    let ok = match op {
        Operator::Stack => true,
        Operator::Chain => left.n_outputs == right.n_inputs,
        Operator::Arithmetic(_) => left == right,
    };
    if ok {
        Ok(())
    } else {
        Err(ShapeMismatch { op, left, right })
    }
}
