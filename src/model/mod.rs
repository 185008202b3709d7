//! The model tree: leaves with a declared arity and separability, and
//! compound nodes joining two sub-models with an operator.
//!
//! Trees are immutable once built. Compound arity is derived from the
//! children at construction time; operand compatibility is checked when the
//! separability matrix is computed, so an ill-formed tree can still be built
//! and displayed for error reporting.

pub mod catalog;
pub mod leaf;
pub mod lower;

use std::fmt;
use std::ops;

use serde::Serialize;

use crate::matrix::CoordMatrix;
use crate::span::Span;

pub use leaf::LeafKind;

/// Largest number of inputs or outputs a model may have. Matrices are
/// dense, so this bounds a single matrix to `MAX_ARITY²` cells.
pub const MAX_ARITY: usize = 4096;

/// Elementwise arithmetic operators. All share one composition rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl ArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Pow => "**",
        }
    }
}

/// How a compound node combines its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    /// `&`: side by side, inputs and outputs concatenated.
    Stack,
    /// `|`: left's outputs feed right's inputs.
    Chain,
    /// `+ - * / **`: same inputs, outputs combined elementwise.
    Arithmetic(ArithOp),
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Stack => "&",
            Operator::Chain => "|",
            Operator::Arithmetic(op) => op.as_str(),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Operator::Stack => "stack",
            Operator::Chain => "chain",
            Operator::Arithmetic(_) => "arithmetic",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelKind {
    Leaf(LeafKind),
    Compound {
        left: Box<Model>,
        right: Box<Model>,
        op: Operator,
    },
}

/// A node of the model tree.
///
/// `Clone`, `PartialEq`, `Debug`, `Display` and `Drop` all walk the tree
/// with explicit stacks, so their cost is linear in the node count and
/// independent of the depth.
pub struct Model {
    name: String,
    n_inputs: usize,
    n_outputs: usize,
    kind: ModelKind,
    span: Span,
    leaves: usize,
    depth: usize,
}

impl Model {
    // --- Leaves ---

    /// A leaf that is either fully separable (identity matrix, requires a
    /// square arity) or fully inseparable (all-`true` matrix).
    pub fn leaf(name: &str, n_inputs: usize, n_outputs: usize, separable: bool) -> Self {
        let kind = if separable {
            LeafKind::Separable
        } else {
            LeafKind::Inseparable
        };
        Self::new_leaf(name.to_string(), n_inputs, n_outputs, kind)
    }

    /// A `k → k` leaf where output `i` depends only on input `i`.
    pub fn separable(name: &str, k: usize) -> Self {
        Self::leaf(name, k, k, true)
    }

    /// A leaf where every output depends on every input.
    pub fn inseparable(name: &str, n_inputs: usize, n_outputs: usize) -> Self {
        Self::leaf(name, n_inputs, n_outputs, false)
    }

    /// `Identity(n)`: passes `n` coordinates through unchanged.
    pub fn identity(n: usize) -> Self {
        Self::new_leaf(format!("Identity({})", n), n, n, LeafKind::Separable)
    }

    /// Coordinate routing: output `i` is a copy of input `indices[i]`.
    /// `n_inputs` defaults to one past the largest index.
    pub fn mapping(indices: Vec<usize>, n_inputs: Option<usize>) -> Self {
        let n_inputs =
            n_inputs.unwrap_or_else(|| indices.iter().max().map_or(0, |&m| m.saturating_add(1)));
        let args: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
        let name = format!("Mapping({})", args.join(", "));
        let n_outputs = indices.len();
        Self::new_leaf(name, n_inputs, n_outputs, LeafKind::Mapping(indices))
    }

    /// A leaf that declares its own dependency matrix, for transforms that
    /// are neither fully separable nor fully inseparable.
    pub fn explicit(name: &str, matrix: CoordMatrix) -> Self {
        let (n_outputs, n_inputs) = matrix.shape();
        Self::new_leaf(
            name.to_string(),
            n_inputs,
            n_outputs,
            LeafKind::Explicit(matrix),
        )
    }

    /// Leaf from parts. Declared arity is trusted here and validated by
    /// the classifier when the matrix is computed.
    pub fn from_leaf_kind(name: &str, n_inputs: usize, n_outputs: usize, kind: LeafKind) -> Self {
        Self::new_leaf(name.to_string(), n_inputs, n_outputs, kind)
    }

    fn new_leaf(name: String, n_inputs: usize, n_outputs: usize, kind: LeafKind) -> Self {
        Self {
            name,
            n_inputs,
            n_outputs,
            kind: ModelKind::Leaf(kind),
            span: Span::dummy(),
            leaves: 1,
            depth: 0,
        }
    }

    // --- Compounds ---

    /// Join two models with `op`. Arity follows the operator:
    /// stack sums both sides, chain takes left inputs and right outputs,
    /// arithmetic keeps the left operand's shape.
    pub fn compound(op: Operator, left: Model, right: Model) -> Self {
        let (n_inputs, n_outputs) = match op {
            // saturating: oversized stacks are rejected at evaluation
            Operator::Stack => (
                left.n_inputs.saturating_add(right.n_inputs),
                left.n_outputs.saturating_add(right.n_outputs),
            ),
            Operator::Chain => (left.n_inputs, right.n_outputs),
            Operator::Arithmetic(_) => (left.n_inputs, left.n_outputs),
        };
        let leaves = left.leaves + right.leaves;
        let depth = left.depth.max(right.depth) + 1;
        let span = if left.span.is_dummy() || right.span.is_dummy() {
            Span::dummy()
        } else {
            left.span.merge(right.span)
        };
        Self {
            name: String::new(),
            n_inputs,
            n_outputs,
            kind: ModelKind::Compound {
                left: Box::new(left),
                right: Box::new(right),
                op,
            },
            span,
            leaves,
            depth,
        }
    }

    pub fn stack(left: Model, right: Model) -> Self {
        Self::compound(Operator::Stack, left, right)
    }

    pub fn chain(left: Model, right: Model) -> Self {
        Self::compound(Operator::Chain, left, right)
    }

    pub fn arithmetic(op: ArithOp, left: Model, right: Model) -> Self {
        Self::compound(Operator::Arithmetic(op), left, right)
    }

    /// `left ** right`; Rust has no operator for it.
    pub fn pow(self, right: Model) -> Self {
        Self::arithmetic(ArithOp::Pow, self, right)
    }

    /// Stack a non-empty sequence left to right: `a & b & c` groups as
    /// `(a & b) & c`.
    pub fn stack_all(models: impl IntoIterator<Item = Model>) -> Option<Self> {
        models.into_iter().reduce(Model::stack)
    }

    /// Attach the source span this node was parsed from.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    // --- Accessors ---

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Leaf name; empty for compound nodes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ModelKind::Leaf(_))
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.kind {
            ModelKind::Compound { op, .. } => Some(*op),
            ModelKind::Leaf(_) => None,
        }
    }

    pub fn children(&self) -> Option<(&Model, &Model)> {
        match &self.kind {
            ModelKind::Compound { left, right, .. } => Some((left, right)),
            ModelKind::Leaf(_) => None,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    /// Longest path from this node to a leaf; 0 for a leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Render with compound nodes nested deeper than `max_depth` shown as
    /// `...`, so error messages stay short for large trees.
    pub fn summary(&self, max_depth: usize) -> String {
        self.render(Some(max_depth))
    }

    fn render(&self, max_depth: Option<usize>) -> String {
        enum Frame<'a> {
            Node(&'a Model, usize),
            Text(&'static str),
            Op(Operator),
        }

        let mut out = String::new();
        let mut stack = vec![Frame::Node(self, 0)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Text(t) => out.push_str(t),
                Frame::Op(op) => {
                    out.push(' ');
                    out.push_str(op.as_str());
                    out.push(' ');
                }
                Frame::Node(model, level) => match &model.kind {
                    ModelKind::Leaf(_) => out.push_str(&model.name),
                    ModelKind::Compound { left, right, op } => {
                        if max_depth.is_some_and(|max| level >= max) {
                            out.push_str("...");
                            continue;
                        }
                        let nested = level > 0;
                        if nested {
                            stack.push(Frame::Text(")"));
                        }
                        stack.push(Frame::Node(right, level + 1));
                        stack.push(Frame::Op(*op));
                        stack.push(Frame::Node(left, level + 1));
                        if nested {
                            stack.push(Frame::Text("("));
                        }
                    }
                },
            }
        }
        out
    }
}

impl fmt::Display for Model {
    /// Fully parenthesized expression, e.g. `Pix2Sky_TAN & (Shift & Scale)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(None))
    }
}

impl Model {
    /// Copy of this node's own fields around a new `kind`.
    fn with_kind(&self, kind: ModelKind) -> Model {
        Model {
            name: self.name.clone(),
            n_inputs: self.n_inputs,
            n_outputs: self.n_outputs,
            kind,
            span: self.span,
            leaves: self.leaves,
            depth: self.depth,
        }
    }

    fn same_node(&self, other: &Model) -> bool {
        self.name == other.name
            && self.n_inputs == other.n_inputs
            && self.n_outputs == other.n_outputs
            && self.span == other.span
            && self.leaves == other.leaves
            && self.depth == other.depth
    }
}

impl Clone for Model {
    fn clone(&self) -> Self {
        enum Task<'a> {
            Visit(&'a Model),
            Join(&'a Model, Operator),
        }

        let mut tasks = vec![Task::Visit(self)];
        let mut built: Vec<Model> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(node) => match &node.kind {
                    ModelKind::Leaf(kind) => built.push(node.with_kind(ModelKind::Leaf(kind.clone()))),
                    ModelKind::Compound { left, right, op } => {
                        tasks.push(Task::Join(node, *op));
                        tasks.push(Task::Visit(right));
                        tasks.push(Task::Visit(left));
                    }
                },
                Task::Join(node, op) => {
                    let (Some(right), Some(left)) = (built.pop(), built.pop()) else {
                        unreachable!("children are cloned before their parent")
                    };
                    built.push(node.with_kind(ModelKind::Compound {
                        left: Box::new(left),
                        right: Box::new(right),
                        op,
                    }));
                }
            }
        }
        match built.pop() {
            Some(model) if built.is_empty() => model,
            _ => unreachable!("cloning must leave exactly one model"),
        }
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if !a.same_node(b) {
                return false;
            }
            match (&a.kind, &b.kind) {
                (ModelKind::Leaf(x), ModelKind::Leaf(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (
                    ModelKind::Compound {
                        left: al,
                        right: ar,
                        op: ao,
                    },
                    ModelKind::Compound {
                        left: bl,
                        right: br,
                        op: bo,
                    },
                ) => {
                    if ao != bo {
                        return false;
                    }
                    pairs.push((&**ar, &**br));
                    pairs.push((&**al, &**bl));
                }
                _ => return false,
            }
        }
        true
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("expr", &self.render(None))
            .field("n_inputs", &self.n_inputs)
            .field("n_outputs", &self.n_outputs)
            .field("span", &self.span)
            .finish()
    }
}

impl Drop for Model {
    // Dismantle the tree with an explicit stack so dropping a very deep
    // model does not recurse once per level.
    fn drop(&mut self) {
        let mut pending: Vec<Box<Model>> = Vec::new();
        take_children(&mut self.kind, &mut pending);
        while let Some(mut node) = pending.pop() {
            take_children(&mut node.kind, &mut pending);
        }
    }
}

fn take_children(kind: &mut ModelKind, pending: &mut Vec<Box<Model>>) {
    if matches!(kind, ModelKind::Compound { .. }) {
        let taken = std::mem::replace(kind, ModelKind::Leaf(LeafKind::Inseparable));
        if let ModelKind::Compound { left, right, .. } = taken {
            pending.push(left);
            pending.push(right);
        }
    }
}

impl ops::BitAnd for Model {
    type Output = Model;

    fn bitand(self, rhs: Model) -> Model {
        Model::stack(self, rhs)
    }
}

impl ops::BitOr for Model {
    type Output = Model;

    fn bitor(self, rhs: Model) -> Model {
        Model::chain(self, rhs)
    }
}

impl ops::Add for Model {
    type Output = Model;

    fn add(self, rhs: Model) -> Model {
        Model::arithmetic(ArithOp::Add, self, rhs)
    }
}

impl ops::Sub for Model {
    type Output = Model;

    fn sub(self, rhs: Model) -> Model {
        Model::arithmetic(ArithOp::Sub, self, rhs)
    }
}

impl ops::Mul for Model {
    type Output = Model;

    fn mul(self, rhs: Model) -> Model {
        Model::arithmetic(ArithOp::Mul, self, rhs)
    }
}

impl ops::Div for Model {
    type Output = Model;

    fn div(self, rhs: Model) -> Model {
        Model::arithmetic(ArithOp::Div, self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift() -> Model {
        Model::separable("Shift", 1)
    }

    fn rot() -> Model {
        Model::inseparable("Rotation2D", 2, 2)
    }

    #[test]
    fn test_stack_arity_sums() {
        let m = rot() & (shift() & shift());
        assert_eq!(m.n_inputs(), 4);
        assert_eq!(m.n_outputs(), 4);
        assert_eq!(m.leaf_count(), 3);
        assert_eq!(m.depth(), 2);
        assert_eq!(m.operator(), Some(Operator::Stack));
    }

    #[test]
    fn test_chain_arity() {
        let m = Model::mapping(vec![0, 0], None) | rot();
        assert_eq!(m.n_inputs(), 1);
        assert_eq!(m.n_outputs(), 2);
    }

    #[test]
    fn test_arithmetic_keeps_shape() {
        let m = rot() + Model::separable("Scale", 2);
        assert_eq!((m.n_inputs(), m.n_outputs()), (2, 2));
        assert_eq!(m.operator(), Some(Operator::Arithmetic(ArithOp::Add)));
    }

    #[test]
    fn test_rust_operator_precedence_matches_expression_language() {
        // `|` binds loosest, `&` tighter, arithmetic tighter still
        let m = shift() & shift() | rot() * rot();
        assert_eq!(m.operator(), Some(Operator::Chain));
        assert_eq!(m.to_string(), "(Shift & Shift) | (Rotation2D * Rotation2D)");
    }

    #[test]
    fn test_mapping_defaults() {
        let m = Model::mapping(vec![0, 1, 0, 1], None);
        assert_eq!((m.n_inputs(), m.n_outputs()), (2, 4));
        assert_eq!(m.name(), "Mapping(0, 1, 0, 1)");

        let m = Model::mapping(vec![1], Some(3));
        assert_eq!((m.n_inputs(), m.n_outputs()), (3, 1));
    }

    #[test]
    fn test_explicit_takes_shape_from_matrix() {
        let m = Model::explicit("Lookup", CoordMatrix::full(3, 2));
        assert_eq!((m.n_inputs(), m.n_outputs()), (2, 3));
    }

    #[test]
    fn test_display_nests_parentheses() {
        let m = Model::inseparable("Pix2Sky_TAN", 2, 2)
            & (Model::separable("Linear1D", 1) & Model::separable("Linear1D", 1));
        assert_eq!(m.to_string(), "Pix2Sky_TAN & (Linear1D & Linear1D)");
    }

    #[test]
    fn test_summary_truncates() {
        let m = ((shift() & shift()) & shift()) & shift();
        assert_eq!(m.summary(1), "... & Shift");
        assert_eq!(m.summary(2), "(... & Shift) & Shift");
        assert_eq!(m.summary(10), m.to_string());
    }

    #[test]
    fn test_pow_method() {
        let m = shift().pow(shift());
        assert_eq!(m.to_string(), "Shift ** Shift");
    }

    #[test]
    fn test_stack_all_groups_left() {
        let m = Model::stack_all(vec![rot(), shift(), shift()]).unwrap();
        assert_eq!(m.to_string(), "(Rotation2D & Shift) & Shift");
        assert!(Model::stack_all(Vec::new()).is_none());
    }

    #[test]
    fn test_span_only_kept_when_both_sides_have_one() {
        let a = shift().with_span(Span::new(0, 5));
        let b = shift().with_span(Span::new(8, 13));
        assert_eq!((a & b).span(), Span::new(0, 13));

        let a = shift().with_span(Span::new(0, 5));
        assert!((a & shift()).span().is_dummy());
    }

    #[test]
    fn test_deep_tree_drops_without_overflow() {
        let deep = (0..50_000).fold(shift(), |acc, _| acc & shift());
        assert_eq!(deep.depth(), 50_000);
        drop(deep);
    }

    #[test]
    fn test_deep_tree_clones_and_compares_without_overflow() {
        let deep = (0..50_000).fold(shift(), |acc, _| acc & shift());
        let copy = deep.clone();
        assert_eq!(copy.depth(), 50_000);
        assert!(copy == deep);

        let other = (0..50_000).fold(shift(), |acc, _| acc | shift());
        assert!(other != deep);

        let shown = format!("{:?}", deep);
        assert!(shown.starts_with("Model { expr: "), "{}", &shown[..40]);
        assert!(shown.contains("n_inputs: 50001"));
    }

    #[test]
    fn test_equality_sees_leaf_kind_and_span() {
        assert_eq!(shift() & shift(), shift() & shift());
        assert_ne!(shift() & shift(), shift() | shift());
        assert_ne!(
            shift().with_span(Span::new(0, 5)),
            shift().with_span(Span::new(1, 6))
        );
        assert_ne!(
            Model::separable("A", 2),
            Model::inseparable("A", 2, 2)
        );
    }
}
