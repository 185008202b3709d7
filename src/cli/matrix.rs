use clap::Args;

use super::{print_json, ModelInput};

#[derive(Args)]
pub struct MatrixArgs {
    #[command(flatten)]
    pub input: ModelInput,
    /// Print the matrix as JSON rows of booleans
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_matrix(args: MatrixArgs) {
    let loaded = args.input.load();
    let report = loaded.analyze();
    tracing::info!(
        outputs = report.n_outputs,
        inputs = report.n_inputs,
        "separability matrix"
    );
    if args.json {
        print_json(&report.matrix);
    } else {
        println!("{}", report.matrix);
    }
}
