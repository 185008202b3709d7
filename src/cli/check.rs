use std::process;

use clap::Args;
use separability::SeparabilityReport;

use super::{print_json, ModelInput};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: ModelInput,
    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
    /// Exit with status 1 unless every output is separable
    #[arg(long)]
    pub strict: bool,
}

pub fn cmd_check(args: CheckArgs) {
    let loaded = args.input.load();
    let report = loaded.analyze();

    if args.json {
        print_json(&report);
    } else {
        for line in report_lines(&report) {
            println!("{}", line);
        }
    }

    if args.strict && !report.is_fully_separable() {
        process::exit(1);
    }
}

/// One line per output: verdict plus the inputs it depends on.
fn report_lines(report: &SeparabilityReport) -> Vec<String> {
    report
        .matrix
        .rows()
        .zip(&report.separable)
        .enumerate()
        .map(|(i, (row, &separable))| {
            let inputs: Vec<String> = row
                .iter()
                .enumerate()
                .filter(|(_, dep)| **dep)
                .map(|(j, _)| j.to_string())
                .collect();
            format!(
                "output {}: {} (input{} {})",
                i,
                if separable { "separable" } else { "inseparable" },
                if inputs.len() == 1 { "" } else { "s" },
                inputs.join(", ")
            )
        })
        .collect()
}
