use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    /// Parse a whole model expression; trailing tokens are an error.
    pub(crate) fn parse_model(mut self) -> Result<Spanned<Expr>, Vec<Diagnostic>> {
        if self.at(&Lexeme::Eof) {
            self.error_with_help(
                "empty model expression",
                "write a model such as `Shift & Scale` or `Mapping(0, 0) | Rotation2D`",
            );
            return Err(self.diagnostics);
        }

        let expr = self.parse_expr_bp(0);

        if !self.at(&Lexeme::Eof) {
            self.error_with_help(
                &format!(
                    "expected an operator or end of input, found {}",
                    self.peek().description()
                ),
                "models combine with '&', '|', '+', '-', '*', '/' or '**'",
            );
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(expr)
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "flatten the expression: `a & b & c` needs no parentheses",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Spanned<Expr> {
        let mut lhs = self.parse_primary();

        loop {
            let op = match self.peek() {
                Lexeme::Pipe => BinOp::Chain,
                Lexeme::Amp => BinOp::Stack,
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                Lexeme::Star => BinOp::Mul,
                Lexeme::Slash => BinOp::Div,
                Lexeme::StarStar => BinOp::Pow,
                _ => break,
            };

            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }

            self.advance(); // consume operator
            let rhs = if op == BinOp::Pow {
                // right-associative: recursion depth grows with the chain
                if !self.enter_nesting() {
                    return lhs;
                }
                let rhs = self.parse_expr_bp(r_bp);
                self.exit_nesting();
                rhs
            } else {
                self.parse_expr_bp(r_bp)
            };
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        lhs
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Ident(name) => {
                self.advance();
                let name = Spanned::new(name, start);
                let args = if self.at(&Lexeme::LParen) {
                    self.advance();
                    let args = self.parse_args();
                    self.expect(&Lexeme::RParen);
                    Some(args)
                } else {
                    None
                };
                let span = start.merge(self.prev_span());
                Spanned::new(Expr::Leaf { name, args }, span)
            }
            Lexeme::LParen => {
                self.advance();
                if !self.enter_nesting() {
                    return self.error_leaf(start);
                }
                let inner = self.parse_expr_bp(0);
                self.exit_nesting();
                self.expect(&Lexeme::RParen);
                // keep the parentheses in the span so errors underline them
                let span = start.merge(self.prev_span());
                Spanned::new(inner.node, span)
            }
            _ => {
                self.error_with_help(
                    &format!("expected a model, found {}", self.peek().description()),
                    "a model is a name like `Shift`, a call like `Mapping(0, 1)`, or a parenthesized expression",
                );
                self.advance();
                self.error_leaf(start)
            }
        }
    }

    /// Integer arguments of a leaf call, possibly negative.
    fn parse_args(&mut self) -> Vec<Spanned<i64>> {
        let mut args = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            let start = self.current_span();
            let negative = self.eat(&Lexeme::Minus);
            let value = self.expect_integer();
            let span = start.merge(self.prev_span());
            let value = match i64::try_from(value) {
                Ok(v) if negative => -v,
                Ok(v) => v,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("argument {} is out of range", value),
                        span,
                    ));
                    0
                }
            };
            args.push(Spanned::new(value, span));
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        args
    }

    fn error_leaf(&self, span: Span) -> Spanned<Expr> {
        Spanned::new(
            Expr::Leaf {
                name: Spanned::new("_error_".to_string(), span),
                args: None,
            },
            span,
        )
    }

    // --- Token helpers ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_integer(&mut self) -> u64 {
        if let Lexeme::Integer(n) = self.peek() {
            let n = *n;
            self.advance();
            n
        } else {
            self.error_at_current(&format!(
                "expected integer literal, found {}",
                self.peek().description()
            ));
            // skip the offending token so argument parsing makes progress
            if !self.at(&Lexeme::RParen) {
                self.advance();
            }
            0
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }
}
