//! Lowering of parsed expressions to model trees.

use crate::ast::{BinOp, Expr};
use crate::diagnostic::Diagnostic;
use crate::model::catalog::Catalog;
use crate::model::{ArithOp, Model, Operator};
use crate::span::{Span, Spanned};

impl From<BinOp> for Operator {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Stack => Operator::Stack,
            BinOp::Chain => Operator::Chain,
            BinOp::Add => Operator::Arithmetic(ArithOp::Add),
            BinOp::Sub => Operator::Arithmetic(ArithOp::Sub),
            BinOp::Mul => Operator::Arithmetic(ArithOp::Mul),
            BinOp::Div => Operator::Arithmetic(ArithOp::Div),
            BinOp::Pow => Operator::Arithmetic(ArithOp::Pow),
        }
    }
}

/// Resolve every leaf against `catalog` and build the model tree. All
/// unresolved leaves are reported, not just the first.
pub fn lower(expr: &Spanned<Expr>, catalog: &Catalog) -> Result<Model, Vec<Diagnostic>> {
    enum Task<'a> {
        Visit(&'a Spanned<Expr>),
        Join(Operator, Span),
    }

    let mut diagnostics = Vec::new();
    let mut tasks = vec![Task::Visit(expr)];
    // `None` marks a subtree that failed to lower
    let mut built: Vec<Option<Model>> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(current) => match &current.node {
                Expr::Leaf { name, args } => {
                    match catalog.instantiate(name, args.as_deref(), current.span) {
                        Ok(model) => built.push(Some(model.with_span(current.span))),
                        Err(diag) => {
                            diagnostics.push(diag);
                            built.push(None);
                        }
                    }
                }
                Expr::BinOp { op, lhs, rhs } => {
                    tasks.push(Task::Join((*op).into(), current.span));
                    tasks.push(Task::Visit(rhs));
                    tasks.push(Task::Visit(lhs));
                }
            },
            Task::Join(op, span) => {
                let right = built.pop().flatten();
                let left = built.pop().flatten();
                built.push(match (left, right) {
                    (Some(l), Some(r)) => Some(Model::compound(op, l, r).with_span(span)),
                    _ => None,
                });
            }
        }
    }

    match built.pop().flatten() {
        Some(model) if diagnostics.is_empty() => Ok(model),
        _ => Err(diagnostics),
    }
}
