use crate::span::Spanned;

/// A parsed model expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A named leaf, optionally with integer arguments: `Shift`, `Mapping(0, 0, 1)`.
    Leaf {
        name: Spanned<String>,
        args: Option<Vec<Spanned<i64>>>,
    },
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
}

impl Expr {
    /// Number of leaves below this expression.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expr::Leaf { .. } => count += 1,
                Expr::BinOp { lhs, rhs, .. } => {
                    stack.push(&rhs.node);
                    stack.push(&lhs.node);
                }
            }
        }
        count
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Chain, // |
    Stack, // &
    Add,   // +
    Sub,   // -
    Mul,   // *
    Div,   // /
    Pow,   // **
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Chain => "|",
            BinOp::Stack => "&",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "**",
        }
    }

    /// Pratt binding powers `(left, right)`. `**` is right-associative,
    /// everything else left-associative.
    pub fn binding_power(&self) -> (u8, u8) {
        match self {
            BinOp::Chain => (1, 2),
            BinOp::Stack => (3, 4),
            BinOp::Add | BinOp::Sub => (5, 6),
            BinOp::Mul | BinOp::Div => (7, 8),
            BinOp::Pow => (10, 9),
        }
    }
}
