pub mod ast;
pub mod lexeme;
pub(crate) mod lexer;
pub(crate) mod parser;
pub mod span;
