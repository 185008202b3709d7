//! Named leaf models available to model expressions.

use std::collections::BTreeMap;

use crate::diagnostic::Diagnostic;
use crate::model::{LeafKind, Model, MAX_ARITY};
use crate::span::{Span, Spanned};

/// How a catalogue name turns into a leaf model.
#[derive(Clone, Debug, PartialEq)]
pub enum LeafTemplate {
    /// Fixed arity and separability; call arguments are model parameters
    /// and do not affect the result.
    Fixed {
        n_inputs: usize,
        n_outputs: usize,
        kind: LeafKind,
    },
    /// `Identity(n)`
    Identity,
    /// `Mapping(i, j, ...)`
    Mapping,
    /// `sep(k)`: a k → k separable leaf.
    Separable,
    /// `full(outputs, inputs)`: an inseparable leaf.
    Full,
}

/// Built-in leaves with a fixed shape: `(name, inputs, outputs, separable)`.
const FIXED_BUILTINS: &[(&str, usize, usize, bool)] = &[
    ("Shift", 1, 1, true),
    ("Scale", 1, 1, true),
    ("Linear1D", 1, 1, true),
    ("Polynomial1D", 1, 1, true),
    ("Rotation2D", 2, 2, false),
    ("AffineTransformation2D", 2, 2, false),
    ("Pix2Sky_TAN", 2, 2, false),
    ("Sky2Pix_TAN", 2, 2, false),
    ("Polynomial2D", 2, 1, false),
];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("model '{0}' is already defined")]
pub struct DuplicateModel(pub String);

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, LeafTemplate>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalogue with the built-in leaves.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for &(name, n_inputs, n_outputs, separable) in FIXED_BUILTINS {
            let kind = if separable {
                LeafKind::Separable
            } else {
                LeafKind::Inseparable
            };
            entries.insert(
                name.to_string(),
                LeafTemplate::Fixed {
                    n_inputs,
                    n_outputs,
                    kind,
                },
            );
        }
        entries.insert("Identity".to_string(), LeafTemplate::Identity);
        entries.insert("Mapping".to_string(), LeafTemplate::Mapping);
        entries.insert("sep".to_string(), LeafTemplate::Separable);
        entries.insert("full".to_string(), LeafTemplate::Full);
        Self { entries }
    }

    /// Add a named leaf. Names are unique, built-ins included.
    pub fn define(&mut self, name: &str, template: LeafTemplate) -> Result<(), DuplicateModel> {
        if self.entries.contains_key(name) {
            return Err(DuplicateModel(name.to_string()));
        }
        self.entries.insert(name.to_string(), template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LeafTemplate> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the leaf for `name(args)`.
    pub fn instantiate(
        &self,
        name: &Spanned<String>,
        args: Option<&[Spanned<i64>]>,
        span: Span,
    ) -> Result<Model, Diagnostic> {
        let Some(template) = self.entries.get(&name.node) else {
            return Err(self.unknown(name));
        };
        let args = args.unwrap_or(&[]);

        let model = match template {
            LeafTemplate::Fixed {
                n_inputs,
                n_outputs,
                kind,
            } => Model::from_leaf_kind(&name.node, *n_inputs, *n_outputs, kind.clone()),
            LeafTemplate::Identity => {
                let [n] = positive_args::<1>(&name.node, args, span, "Identity(n)")?;
                Model::identity(n)
            }
            LeafTemplate::Separable => {
                let [k] = positive_args::<1>(&name.node, args, span, "sep(k)")?;
                Model::from_leaf_kind(&format!("sep({})", k), k, k, LeafKind::Separable)
            }
            LeafTemplate::Full => {
                let [outputs, inputs] =
                    positive_args::<2>(&name.node, args, span, "full(outputs, inputs)")?;
                Model::from_leaf_kind(
                    &format!("full({}, {})", outputs, inputs),
                    inputs,
                    outputs,
                    LeafKind::Inseparable,
                )
            }
            LeafTemplate::Mapping => {
                if args.is_empty() {
                    return Err(Diagnostic::error(
                        "Mapping needs at least one input index".to_string(),
                        span,
                    )
                    .with_help("`Mapping(0, 0)` duplicates input 0 onto two outputs".to_string()));
                }
                let mut indices = Vec::with_capacity(args.len());
                if args.len() > MAX_ARITY {
                    return Err(Diagnostic::error(
                        format!(
                            "Mapping has {} outputs, more than the limit of {}",
                            args.len(),
                            MAX_ARITY
                        ),
                        span,
                    ));
                }
                for arg in args {
                    match usize::try_from(arg.node) {
                        Ok(i) if i < MAX_ARITY => indices.push(i),
                        Ok(i) => {
                            return Err(Diagnostic::error(
                                format!("mapping index {} exceeds the limit of {} inputs", i, MAX_ARITY),
                                arg.span,
                            ))
                        }
                        Err(_) => {
                            return Err(Diagnostic::error(
                                format!("mapping index {} is negative", arg.node),
                                arg.span,
                            ))
                        }
                    }
                }
                Model::mapping(indices, None)
            }
        };
        Ok(model)
    }

    fn unknown(&self, name: &Spanned<String>) -> Diagnostic {
        let diag = Diagnostic::error(format!("unknown model '{}'", name.node), name.span);
        if let Some(close) = self
            .names()
            .find(|known| known.eq_ignore_ascii_case(&name.node))
        {
            return diag.with_help(format!("did you mean '{}'?", close));
        }
        let known: Vec<&str> = self.names().collect();
        diag.with_note(format!("known models: {}", known.join(", ")))
            .with_help("define custom leaves in separability.toml under [[model]]".to_string())
    }
}

/// Exactly `N` arguments, each at least 1.
fn positive_args<const N: usize>(
    name: &str,
    args: &[Spanned<i64>],
    span: Span,
    usage: &str,
) -> Result<[usize; N], Diagnostic> {
    if args.len() != N {
        return Err(Diagnostic::error(
            format!(
                "'{}' takes {} argument{}, found {}",
                name,
                N,
                if N == 1 { "" } else { "s" },
                args.len()
            ),
            span,
        )
        .with_help(format!("usage: {}", usage)));
    }
    let mut out = [0usize; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = match usize::try_from(arg.node) {
            Ok(v) if (1..=MAX_ARITY).contains(&v) => v,
            Ok(v) if v > MAX_ARITY => {
                return Err(Diagnostic::error(
                    format!("'{}' size {} exceeds the limit of {}", name, v, MAX_ARITY),
                    arg.span,
                ))
            }
            _ => {
                return Err(Diagnostic::error(
                    format!("'{}' needs a positive size, found {}", name, arg.node),
                    arg.span,
                ))
            }
        };
    }
    Ok(out)
}
