//! Separability analysis for compound coordinate-transform models.
//!
//! A model maps `n_inputs` coordinates to `n_outputs` coordinates. Compound
//! models join two sub-models with `&` (stack), `|` (chain) or an
//! elementwise arithmetic operator. The separability matrix records which
//! inputs every output depends on.
//!
//! ```
//! use separability::{analyze_source, Catalog, EvalOptions};
//!
//! let report = analyze_source(
//!     "Pix2Sky_TAN & (Shift & Scale)",
//!     &Catalog::builtin(),
//!     &EvalOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(report.separable, vec![false, false, true, true]);
//! ```

pub mod config;
pub mod diagnostic;
pub mod matrix;
pub mod model;
pub mod separable;
pub mod syntax;

// Re-exports: keep `crate::X` paths short for the front-end modules
pub use syntax::{ast, lexeme, span};
pub(crate) use syntax::{lexer, parser};

pub use config::{ConfigError, ProjectConfig};
pub use diagnostic::Diagnostic;
pub use matrix::CoordMatrix;
pub use model::catalog::Catalog;
pub use model::{ArithOp, LeafKind, Model, Operator};
pub use separable::{
    analyze, coord_matrix, coord_matrix_par, is_separable, separability_matrix,
    separability_matrix_with, EvalOptions, NodePath, SeparabilityError, SeparabilityReport,
};

use ast::Expr;
use lexer::Lexer;
use parser::Parser;
use span::Spanned;

/// Parse a model expression without resolving any names.
pub fn parse_model(source: &str) -> Result<Spanned<Expr>, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens).parse_model()
}

/// Parse `source` and resolve its leaves against `catalog`.
pub fn load_model(source: &str, catalog: &Catalog) -> Result<Model, Vec<Diagnostic>> {
    let expr = parse_model(source)?;
    let model = model::lower::lower(&expr, catalog)?;
    tracing::debug!(
        inputs = model.n_inputs(),
        outputs = model.n_outputs(),
        leaves = model.leaf_count(),
        depth = model.depth(),
        "loaded model"
    );
    Ok(model)
}

/// Parse, resolve and analyze `source` in one step. Evaluation errors are
/// reported as diagnostics pointing at the offending sub-expression.
pub fn analyze_source(
    source: &str,
    catalog: &Catalog,
    options: &EvalOptions,
) -> Result<SeparabilityReport, Vec<Diagnostic>> {
    let model = load_model(source, catalog)?;
    analyze(&model, options).map_err(|e| vec![e.to_diagnostic()])
}
