use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::model::leaf::LeafDefect;
use crate::model::{Model, Operator, MAX_ARITY};
use crate::span::Span;

/// One step from a compound node to a child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    Left,
    Right,
}

/// Location of a node as the steps taken from the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<Branch>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path from `root` to the node at address `target`, found by an
    /// explicit-stack search. Falls back to the root path when `target` is
    /// not part of the tree.
    pub fn locate(root: &Model, target: &Model) -> NodePath {
        let mut stack: Vec<(&Model, Vec<Branch>)> = vec![(root, Vec::new())];
        while let Some((node, path)) = stack.pop() {
            if std::ptr::eq(node, target) {
                return NodePath(path);
            }
            if let Some((left, right)) = node.children() {
                let mut right_path = path.clone();
                right_path.push(Branch::Right);
                stack.push((right, right_path));
                let mut left_path = path;
                left_path.push(Branch::Left);
                stack.push((left, left_path));
            }
        }
        NodePath::root()
    }

    /// Follow the path down from `root`.
    pub fn resolve<'a>(&self, root: &'a Model) -> Option<&'a Model> {
        let mut node = root;
        for step in &self.0 {
            let (left, right) = node.children()?;
            node = match step {
                Branch::Left => left,
                Branch::Right => right,
            };
        }
        Some(node)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        for step in &self.0 {
            match step {
                Branch::Left => write!(f, ".left")?,
                Branch::Right => write!(f, ".right")?,
            }
        }
        Ok(())
    }
}

/// Arity of a node, as `(outputs, inputs)` like the matrix shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    pub n_outputs: usize,
    pub n_inputs: usize,
}

impl Shape {
    pub fn new(n_outputs: usize, n_inputs: usize) -> Self {
        Self {
            n_outputs,
            n_inputs,
        }
    }

    pub fn of(model: &Model) -> Self {
        Self::new(model.n_outputs(), model.n_inputs())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} outputs x {} inputs", self.n_outputs, self.n_inputs)
    }
}

/// Operand shapes that an operator cannot combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub op: Operator,
    pub left: Shape,
    pub right: Shape,
}

impl ShapeMismatch {
    /// What the right operand should have looked like.
    pub fn expected(&self) -> String {
        match self.op {
            Operator::Chain => format!("right side taking {} inputs", self.left.n_outputs),
            _ => format!("right side with {}", self.left),
        }
    }

    pub fn found(&self) -> String {
        match self.op {
            Operator::Chain => format!("right side taking {} inputs", self.right.n_inputs),
            _ => format!("right side with {}", self.right),
        }
    }
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operator::Chain => write!(
                f,
                "left side produces {} outputs but right side takes {} inputs",
                self.left.n_outputs, self.right.n_inputs
            ),
            _ => write!(
                f,
                "'{}' needs operands of the same shape, found {} and {}",
                self.op, self.left, self.right
            ),
        }
    }
}

/// Structural errors found while building a separability matrix. No
/// partial matrix is produced when one of these is returned.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SeparabilityError {
    #[error("structural mismatch at {path}: {mismatch}")]
    StructuralMismatch {
        path: NodePath,
        /// Rendered (possibly truncated) expression of the failing node.
        node: String,
        mismatch: ShapeMismatch,
        span: Span,
    },
    #[error("invalid leaf '{name}' at {path}: {defect}")]
    InvalidLeaf {
        path: NodePath,
        name: String,
        defect: LeafDefect,
        span: Span,
    },
    #[error("model at {path} is too large: {shape} exceeds {max} per side", max = MAX_ARITY)]
    TooLarge {
        path: NodePath,
        node: String,
        shape: Shape,
        span: Span,
    },
}

/// Compound nodes deeper than this are elided in error messages.
const NODE_SUMMARY_DEPTH: usize = 3;

impl SeparabilityError {
    pub(crate) fn mismatch(root: &Model, node: &Model, mismatch: ShapeMismatch) -> Self {
        SeparabilityError::StructuralMismatch {
            path: NodePath::locate(root, node),
            node: node.summary(NODE_SUMMARY_DEPTH),
            mismatch,
            span: node.span(),
        }
    }

    pub(crate) fn invalid_leaf(root: &Model, leaf: &Model, defect: LeafDefect) -> Self {
        SeparabilityError::InvalidLeaf {
            path: NodePath::locate(root, leaf),
            name: leaf.name().to_string(),
            defect,
            span: leaf.span(),
        }
    }

    pub(crate) fn too_large(root: &Model, node: &Model) -> Self {
        SeparabilityError::TooLarge {
            path: NodePath::locate(root, node),
            node: node.summary(NODE_SUMMARY_DEPTH),
            shape: Shape::of(node),
            span: node.span(),
        }
    }

    pub fn path(&self) -> &NodePath {
        match self {
            SeparabilityError::StructuralMismatch { path, .. }
            | SeparabilityError::InvalidLeaf { path, .. }
            | SeparabilityError::TooLarge { path, .. } => path,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SeparabilityError::StructuralMismatch { span, .. }
            | SeparabilityError::InvalidLeaf { span, .. }
            | SeparabilityError::TooLarge { span, .. } => *span,
        }
    }

    /// Diagnostic pointing at the failing node's source span.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            SeparabilityError::StructuralMismatch {
                path,
                node,
                mismatch,
                span,
            } => {
                let diag = Diagnostic::error(mismatch.to_string(), *span)
                    .with_note(format!("in `{}` at {}", node, path))
                    .with_note(format!("expected {}", mismatch.expected()))
                    .with_note(format!("found {}", mismatch.found()));
                match mismatch.op {
                    Operator::Chain => diag.with_help(
                        "route coordinates with a Mapping so the counts line up".to_string(),
                    ),
                    _ => diag,
                }
            }
            SeparabilityError::InvalidLeaf {
                path,
                name,
                defect,
                span,
            } => Diagnostic::error(format!("invalid leaf '{}': {}", name, defect), *span)
                .with_note(format!("at {}", path)),
            SeparabilityError::TooLarge {
                path,
                node,
                shape,
                span,
            } => Diagnostic::error(format!("model is too large: {}", shape), *span)
                .with_note(format!("in `{}` at {}", node, path))
                .with_note(format!("at most {} inputs and {} outputs", MAX_ARITY, MAX_ARITY)),
        }
    }
}
