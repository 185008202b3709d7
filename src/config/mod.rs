//! Project configuration: `separability.toml`.
//!
//! ```toml
//! [engine]
//! parallel = true
//! parallel_threshold = 64
//!
//! [[model]]
//! name = "Spectral3D"
//! inputs = 3
//! outputs = 3
//! separable = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::matrix::CoordMatrix;
use crate::model::catalog::{Catalog, LeafTemplate};
use crate::model::{LeafKind, MAX_ARITY};
use crate::separable::EvalOptions;

pub const CONFIG_FILE: &str = "separability.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid model '{name}': {reason}")]
    InvalidModel { name: String, reason: String },
    #[error(transparent)]
    Duplicate(#[from] crate::model::catalog::DuplicateModel),
}

/// A custom leaf declared under `[[model]]`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDef {
    pub name: String,
    pub inputs: usize,
    pub outputs: usize,
    /// Fully separable or fully inseparable. Ignored when `matrix` is set.
    #[serde(default)]
    pub separable: bool,
    /// Explicit dependency rows, `0`/`1` per input.
    pub matrix: Option<Vec<Vec<u8>>>,
}

impl ModelDef {
    fn template(&self) -> Result<LeafTemplate, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidModel {
            name: self.name.clone(),
            reason,
        };

        if !self
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid(
                "names must be identifiers (letters, digits, '_')".to_string(),
            ));
        }
        if self.inputs == 0 || self.outputs == 0 {
            return Err(invalid("inputs and outputs must be at least 1".to_string()));
        }
        if self.inputs > MAX_ARITY || self.outputs > MAX_ARITY {
            return Err(invalid(format!(
                "inputs and outputs are limited to {}",
                MAX_ARITY
            )));
        }

        let kind = match &self.matrix {
            Some(rows) => {
                let mut bools = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut out = Vec::with_capacity(row.len());
                    for &cell in row {
                        match cell {
                            0 => out.push(false),
                            1 => out.push(true),
                            other => {
                                return Err(invalid(format!(
                                    "matrix cells must be 0 or 1, found {}",
                                    other
                                )))
                            }
                        }
                    }
                    bools.push(out);
                }
                let matrix = CoordMatrix::from_rows(&bools)
                    .ok_or_else(|| invalid("matrix rows have different lengths".to_string()))?;
                if matrix.shape() != (self.outputs, self.inputs) {
                    return Err(invalid(format!(
                        "matrix is {}x{} but the model has {} outputs and {} inputs",
                        matrix.n_rows(),
                        matrix.n_cols(),
                        self.outputs,
                        self.inputs
                    )));
                }
                if !matrix.rows_all_nonempty() {
                    return Err(invalid("every output must depend on some input".to_string()));
                }
                LeafKind::Explicit(matrix)
            }
            None if self.separable => {
                if self.inputs != self.outputs {
                    return Err(invalid(format!(
                        "a separable model needs as many outputs as inputs, found {} inputs and {} outputs",
                        self.inputs, self.outputs
                    )));
                }
                LeafKind::Separable
            }
            None => LeafKind::Inseparable,
        };

        Ok(LeafTemplate::Fixed {
            n_inputs: self.inputs,
            n_outputs: self.outputs,
            kind,
        })
    }
}

/// Parsed `separability.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub engine: EvalOptions,
    #[serde(default, rename = "model")]
    pub models: Vec<ModelDef>,
}

impl ProjectConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, path)?;
        tracing::debug!(
            path = %path.display(),
            models = config.models.len(),
            parallel = config.engine.parallel,
            "loaded config"
        );
        Ok(config)
    }

    /// Try to find a separability.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Built-in leaves plus every `[[model]]` entry.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let mut catalog = Catalog::builtin();
        for def in &self.models {
            catalog.define(&def.name, def.template()?)?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(content: &str) -> Result<ProjectConfig, ConfigError> {
        ProjectConfig::parse(content, Path::new(CONFIG_FILE))
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.engine, EvalOptions::default());
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_engine_section() {
        let config = parse("[engine]\nparallel = true\nparallel_threshold = 8\n").unwrap();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.parallel_threshold, 8);
    }

    #[test]
    fn test_partial_engine_section_keeps_defaults() {
        let config = parse("[engine]\nparallel = true\n").unwrap();
        assert_eq!(config.engine.parallel_threshold, 64);
    }

    #[test]
    fn test_models_extend_catalog() {
        let config = parse(
            r#"
[[model]]
name = "Spectral3D"
inputs = 3
outputs = 3

[[model]]
name = "Lookup"
inputs = 2
outputs = 2
matrix = [[1, 0], [1, 1]]
"#,
        )
        .unwrap();
        let catalog = config.catalog().unwrap();
        assert!(catalog.contains("Spectral3D"));
        assert!(catalog.contains("Shift"));
        match catalog.get("Lookup") {
            Some(LeafTemplate::Fixed {
                kind: LeafKind::Explicit(m),
                ..
            }) => assert_eq!(m.row_counts(), vec![1, 2]),
            other => panic!("unexpected template {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse("[engine]\nthreads = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_separable_model() {
        let config = parse(
            "[[model]]\nname = \"Fan\"\ninputs = 1\noutputs = 2\nseparable = true\n",
        )
        .unwrap();
        let err = config.catalog().unwrap_err();
        assert!(err.to_string().contains("invalid model 'Fan'"), "{}", err);
    }

    #[test]
    fn test_matrix_shape_must_match() {
        let config = parse(
            "[[model]]\nname = \"Bad\"\ninputs = 2\noutputs = 2\nmatrix = [[1, 0, 1], [0, 1, 0]]\n",
        )
        .unwrap();
        assert!(matches!(
            config.catalog(),
            Err(ConfigError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_matrix_cells_are_bits() {
        let config = parse(
            "[[model]]\nname = \"Bad\"\ninputs = 1\noutputs = 1\nmatrix = [[2]]\n",
        )
        .unwrap();
        let err = config.catalog().unwrap_err();
        assert!(err.to_string().contains("must be 0 or 1"));
    }

    #[test]
    fn test_oversized_model_rejected() {
        let config = parse(
            "[[model]]\nname = \"Cube\"\ninputs = 10000000000\noutputs = 1\n",
        )
        .unwrap();
        let err = config.catalog().unwrap_err();
        assert!(err.to_string().contains("limited to 4096"), "{}", err);
    }

    #[test]
    fn test_duplicate_builtin_rejected() {
        let config = parse("[[model]]\nname = \"Shift\"\ninputs = 1\noutputs = 1\n").unwrap();
        assert!(matches!(config.catalog(), Err(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_bad_name_rejected() {
        let config = parse("[[model]]\nname = \"my model\"\ninputs = 1\noutputs = 1\n").unwrap();
        assert!(matches!(
            config.catalog(),
            Err(ConfigError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_load_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(&toml_path, "[engine]\nparallel = true\n").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = ProjectConfig::find(&nested).unwrap();
        assert_eq!(found, toml_path);
        let config = ProjectConfig::load(&found).unwrap();
        assert!(config.engine.parallel);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
