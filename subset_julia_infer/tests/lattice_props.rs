//! Property tests for the abstract value lattice.
//!
//! 1. Merge is an upper bound of both operands
//! 2. Merge is commutative and idempotent
//! 3. Merging ever deeper types stabilizes with a depth-limited result

mod common;

use common::Program;
use proptest::prelude::*;

use subset_julia_infer::lattice::{AbstractValue, ConstValue};
use subset_julia_infer::types::JuliaType;

fn arb_leaf() -> impl Strategy<Value = AbstractValue> {
    let leaf_types = prop::sample::select(vec![
        JuliaType::int64(),
        JuliaType::float64(),
        JuliaType::bool(),
        JuliaType::string(),
        JuliaType::nothing(),
        JuliaType::Tuple(vec![JuliaType::int64(), JuliaType::string()]),
    ]);
    let abstract_types =
        prop::sample::select(vec![JuliaType::named("Number"), JuliaType::named("Real")]);
    prop_oneof![
        Just(AbstractValue::Top),
        Just(AbstractValue::Bottom),
        (-3i64..3).prop_map(AbstractValue::int),
        any::<bool>().prop_map(AbstractValue::boolean),
        Just(AbstractValue::Const(ConstValue::String("s".into()))),
        (leaf_types, any::<bool>())
            .prop_map(|(ty, exact)| AbstractValue::with_exactness(ty, exact)),
        abstract_types.prop_map(AbstractValue::concrete),
        Just(AbstractValue::type_value(JuliaType::int64(), true)),
    ]
}

/// A leaf or the merge of a few leaves.
fn arb_value() -> impl Strategy<Value = AbstractValue> {
    prop::collection::vec(arb_leaf(), 1..4).prop_map(|leaves| {
        let p = Program::new();
        let lattice = p.lattice();
        leaves
            .iter()
            .fold(AbstractValue::Bottom, |acc, v| lattice.merge(&acc, v))
    })
}

fn nested_tuple(depth: usize) -> JuliaType {
    (0..depth).fold(JuliaType::int64(), |acc, _| JuliaType::Tuple(vec![acc]))
}

proptest! {
    #[test]
    fn merge_is_an_upper_bound(a in arb_value(), b in arb_value()) {
        let p = Program::new();
        let lattice = p.lattice();
        let m = lattice.merge(&a, &b);
        prop_assert!(lattice.le(&a, &m), "{} not below {}", a, m);
        prop_assert!(lattice.le(&b, &m), "{} not below {}", b, m);
    }

    #[test]
    fn merge_is_commutative(a in arb_value(), b in arb_value()) {
        let p = Program::new();
        let lattice = p.lattice();
        prop_assert_eq!(lattice.merge(&a, &b), lattice.merge(&b, &a));
    }

    #[test]
    fn merge_is_idempotent(a in arb_value()) {
        let p = Program::new();
        let lattice = p.lattice();
        prop_assert_eq!(lattice.merge(&a, &a), a);
    }

    #[test]
    fn merge_with_bottom_is_identity(a in arb_value()) {
        let p = Program::new();
        let lattice = p.lattice();
        prop_assert_eq!(lattice.merge(&AbstractValue::Bottom, &a), a.clone());
        prop_assert_eq!(lattice.merge(&a, &AbstractValue::Bottom), a);
    }

    #[test]
    fn deepening_merges_stabilize(start in 0usize..12, len in 8usize..40) {
        let p = Program::new();
        let lattice = p.lattice();
        let max_changes = p.limits.max_union_length + 2;

        let mut acc = AbstractValue::Bottom;
        let mut changes = 0;
        for depth in start..start + len {
            let next = lattice.merge(&acc, &AbstractValue::exact(nested_tuple(depth)));
            if next != acc {
                changes += 1;
            }
            acc = next;
        }
        prop_assert!(changes <= max_changes, "{} changes, ended at {}", changes, acc);
        prop_assert!(lattice.widen_type(&acc).depth() <= p.limits.max_type_depth);
    }
}
