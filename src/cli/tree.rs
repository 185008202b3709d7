use std::fmt::Write;

use clap::Args;
use separability::Model;

use super::ModelInput;

#[derive(Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub input: ModelInput,
}

pub fn cmd_tree(args: TreeArgs) {
    let loaded = args.input.load();
    print!("{}", render_tree(&loaded.model));
}

/// One node per line, children indented under their operator, with
/// `inputs -> outputs` for every node.
fn render_tree(model: &Model) -> String {
    let mut out = String::new();
    let mut stack = vec![(model, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let label = match node.operator() {
            Some(op) => op.as_str(),
            None => node.name(),
        };
        let _ = writeln!(
            out,
            "{:indent$}{} [{} -> {}]",
            "",
            label,
            node.n_inputs(),
            node.n_outputs(),
            indent = depth * 2
        );
        if let Some((left, right)) = node.children() {
            stack.push((right, depth + 1));
            stack.push((left, depth + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use separability::{load_model, Catalog};

    #[test]
    fn test_render_tree() {
        let model = load_model("Mapping(0, 0, 1) | Rotation2D & Shift", &Catalog::builtin()).unwrap();
        insta::assert_snapshot!(render_tree(&model), @r"
        | [2 -> 3]
          Mapping(0, 0, 1) [2 -> 3]
          & [3 -> 3]
            Rotation2D [2 -> 2]
            Shift [1 -> 1]
        ");
    }
}
