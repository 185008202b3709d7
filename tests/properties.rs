//! Properties that hold for every well-formed model tree.

use proptest::prelude::*;
use separability::{coord_matrix, coord_matrix_par, is_separable, Model};

fn leaf() -> impl Strategy<Value = Model> {
    prop_oneof![
        (1usize..=3).prop_map(|k| Model::separable("sep", k)),
        (1usize..=3, 1usize..=3).prop_map(|(i, o)| Model::inseparable("full", i, o)),
        prop::collection::vec(0usize..3, 1..4).prop_map(|ix| Model::mapping(ix, Some(3))),
    ]
}

/// Trees whose operands always line up: chains end in a leaf sized to the
/// left side, arithmetic combines a subtree with itself.
fn model() -> impl Strategy<Value = Model> {
    leaf().prop_recursive(5, 48, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a & b),
            (inner.clone(), 1usize..=3).prop_map(|(a, out)| {
                let n = a.n_outputs();
                a | Model::inseparable("mix", n, out)
            }),
            inner.clone().prop_map(|a| {
                let n = a.n_outputs();
                a | Model::separable("sep", n)
            }),
            inner.prop_map(|a| a.clone() + a),
        ]
    })
}

proptest! {
    #[test]
    fn matrix_has_model_shape(m in model()) {
        let matrix = coord_matrix(&m).unwrap();
        prop_assert_eq!(matrix.shape(), (m.n_outputs(), m.n_inputs()));
        prop_assert!(matrix.rows_all_nonempty());
    }

    #[test]
    fn stack_is_block_diagonal(a in model(), b in model()) {
        let (ao, ai) = (a.n_outputs(), a.n_inputs());
        let (bo, bi) = (b.n_outputs(), b.n_inputs());
        let ma = coord_matrix(&a).unwrap();
        let mb = coord_matrix(&b).unwrap();

        let m = coord_matrix(&(a & b)).unwrap();
        prop_assert_eq!(m.block(0, 0, ao, ai), ma);
        prop_assert_eq!(m.block(ao, ai, bo, bi), mb);
        prop_assert_eq!(m.block(0, ai, ao, bi).count_true(), 0);
        prop_assert_eq!(m.block(ao, 0, bo, ai).count_true(), 0);
    }

    #[test]
    fn stack_nesting_is_irrelevant(a in model(), b in model(), c in model()) {
        let left = (a.clone() & b.clone()) & c.clone();
        let right = a & (b & c);
        prop_assert_eq!(coord_matrix(&left).unwrap(), coord_matrix(&right).unwrap());
    }

    #[test]
    fn chaining_separable_leaf_keeps_matrix(a in model()) {
        let before = coord_matrix(&a).unwrap();
        let n = a.n_outputs();
        let after = coord_matrix(&(a | Model::separable("id", n))).unwrap();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn parallel_matches_sequential(m in model(), threshold in 1usize..8) {
        prop_assert_eq!(coord_matrix_par(&m, threshold).unwrap(), coord_matrix(&m).unwrap());
    }

    #[test]
    fn separable_outputs_read_one_input(m in model()) {
        let flags = is_separable(&m).unwrap();
        prop_assert_eq!(flags.len(), m.n_outputs());
        if m.n_inputs() == 1 && m.n_outputs() > 1 {
            prop_assert!(flags.iter().all(|&s| !s));
        } else {
            let counts = coord_matrix(&m).unwrap().row_counts();
            for (flag, count) in flags.into_iter().zip(counts) {
                prop_assert_eq!(flag, count == 1);
            }
        }
    }
}
