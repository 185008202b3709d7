pub mod check;
pub mod matrix;
pub mod tree;

use std::path::PathBuf;
use std::process;

use clap::Args;
use separability::diagnostic::render_diagnostics;
use separability::{Catalog, EvalOptions, Model, ProjectConfig};

/// Where the model expression comes from, plus config overrides shared by
/// every subcommand.
#[derive(Args)]
pub struct ModelInput {
    /// Model expression, e.g. "Mapping(0, 0, 1) | Rotation2D & Shift"
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub expr: Option<String>,
    /// Read the model expression from a file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Config file (default: nearest separability.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Evaluate independent subtrees in parallel
    #[arg(long)]
    pub parallel: bool,
    /// Minimum leaves on both sides of a node before forking
    #[arg(long, value_name = "N")]
    pub threshold: Option<usize>,
}

/// A model loaded from the command line, with the settings it was loaded
/// under.
pub struct Loaded {
    pub model: Model,
    pub options: EvalOptions,
    pub source: String,
    pub filename: String,
}

impl ModelInput {
    fn read_source(&self) -> (String, String) {
        match (&self.expr, &self.file) {
            (Some(expr), _) => (expr.clone(), "<expr>".to_string()),
            (None, Some(path)) => match std::fs::read_to_string(path) {
                Ok(source) => (source, path.display().to_string()),
                Err(e) => {
                    eprintln!("error: cannot read '{}': {}", path.display(), e);
                    process::exit(1);
                }
            },
            (None, None) => {
                eprintln!("error: give a model expression or --file");
                process::exit(1);
            }
        }
    }

    fn project_config(&self) -> ProjectConfig {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => std::env::current_dir()
                .ok()
                .and_then(|dir| ProjectConfig::find(&dir)),
        };
        let Some(path) = path else {
            return ProjectConfig::default();
        };
        tracing::info!(path = %path.display(), "using config");
        match ProjectConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    }

    /// Parse and resolve the model, exiting with status 1 on any error.
    pub fn load(&self) -> Loaded {
        let config = self.project_config();
        let catalog = match config.catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        };

        let mut options = config.engine.clone();
        if self.parallel {
            options.parallel = true;
        }
        if let Some(threshold) = self.threshold {
            options.parallel_threshold = threshold;
        }

        let (source, filename) = self.read_source();
        let model = load_or_exit(&source, &filename, &catalog);
        Loaded {
            model,
            options,
            source,
            filename,
        }
    }
}

fn load_or_exit(source: &str, filename: &str, catalog: &Catalog) -> Model {
    match separability::load_model(source, catalog) {
        Ok(model) => model,
        Err(diagnostics) => {
            render_diagnostics(&diagnostics, filename, source);
            process::exit(1);
        }
    }
}

impl Loaded {
    /// Analyze the model, rendering evaluation errors against the source.
    pub fn analyze(&self) -> separability::SeparabilityReport {
        match separability::analyze(&self.model, &self.options) {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(path = %e.path(), "evaluation failed");
                e.to_diagnostic().render(&self.filename, &self.source);
                process::exit(1);
            }
        }
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("error: cannot serialize output: {}", e);
            process::exit(1);
        }
    }
}

