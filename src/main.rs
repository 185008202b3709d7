mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "separability",
    version,
    about = "Which outputs of a compound transform depend on which inputs"
)]
struct Cli {
    /// Log engine progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the separability matrix (one row per output)
    Matrix(cli::matrix::MatrixArgs),
    /// Report which outputs are separable
    Check(cli::check::CheckArgs),
    /// Print the model tree with the arity of every node
    Tree(cli::tree::TreeArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Matrix(args) => cli::matrix::cmd_matrix(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Tree(args) => cli::tree::cmd_tree(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
