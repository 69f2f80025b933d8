//! Property-based tests for scheme trees.
//!
//! Random paths, gates and build strategies; checks that costs stay
//! consistent through construction and purification and that the what-if
//! evaluation agrees with the real mutation.

use proptest::prelude::*;
use qupath_phys::{Edge, Fidelity, Gate, HardwarePreset, OpKind};
use qupath_tree::{BuildStrategy, NodeIndex, NodeKind, Spst};

fn arb_fids(max_len: usize) -> impl Strategy<Value = Vec<Fidelity>> {
    prop::collection::vec(0.6_f64..=1.0, 1..=max_len)
}

fn arb_gate() -> impl Strategy<Value = Gate> {
    prop_oneof![
        Just(Gate::dephased_perfect()),
        prop::sample::select(HardwarePreset::ALL.to_vec()).prop_map(Gate::werner),
    ]
}

fn arb_strategy() -> impl Strategy<Value = BuildStrategy> {
    prop::sample::select(BuildStrategy::IMPLEMENTED.to_vec())
}

fn build(fids: &[Fidelity], gate: Gate, strategy: BuildStrategy) -> Spst {
    let path = fids
        .iter()
        .enumerate()
        .map(|(i, &f)| (Edge::from((i as u32, i as u32 + 1)), f));
    let mut spst = Spst::new(path, gate).expect("valid path");
    spst.build(strategy, None).expect("implemented strategy");
    spst
}

fn nodes(spst: &Spst) -> Vec<NodeIndex> {
    spst.tree()
        .preorder(spst.root().expect("built"))
        .collect()
}

fn costs_consistent(spst: &Spst) -> Result<(), TestCaseError> {
    let tree = spst.tree();
    for i in nodes(spst) {
        let node = &tree[i];
        match *node.kind() {
            NodeKind::Leaf => {
                prop_assert_eq!(node.cost, 1.0);
            }
            NodeKind::Branch {
                left, right, prob, ..
            } => {
                let expected = (tree[left].cost + tree[right].cost) / prob;
                prop_assert!(
                    (node.cost - expected).abs() <= 1e-9 * expected,
                    "node {}: {} != {}",
                    i,
                    node.cost,
                    expected
                );
            }
        }
    }
    Ok(())
}

proptest! {
    /// Branch costs equal (left + right) / prob after build.
    #[test]
    fn test_cost_invariant_after_build(
        fids in arb_fids(16),
        gate in arb_gate(),
        strategy in arb_strategy(),
    ) {
        let spst = build(&fids, gate, strategy);
        costs_consistent(&spst)?;
        prop_assert_eq!(spst.tree().leaves(spst.root().unwrap()).len(), fids.len());
        prop_assert_eq!(spst.tree().len(), 2 * fids.len() - 1);
    }

    /// Branch costs stay consistent after purifying any node.
    #[test]
    fn test_cost_invariant_after_purify(
        fids in arb_fids(10),
        gate in arb_gate(),
        strategy in arb_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut spst = build(&fids, gate, strategy);
        let all = nodes(&spst);
        let target = all[pick.index(all.len())];
        let branch = spst.purify(target).unwrap();
        costs_consistent(&spst)?;
        prop_assert_eq!(spst.node(branch).unwrap().op(), Some(OpKind::Purify));
        let grown = spst.tree().leaves(spst.root().unwrap()).len();
        prop_assert_eq!(grown, fids.len() + spst.tree().leaves(target).len());
    }

    /// The what-if evaluation reproduces the mutated root exactly.
    #[test]
    fn test_virtual_purify_matches_purify(
        fids in arb_fids(10),
        gate in arb_gate(),
        strategy in arb_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let spst = build(&fids, gate, strategy);
        let all = nodes(&spst);
        let target = all[pick.index(all.len())];

        let predicted = spst.virtual_purify(target).unwrap();
        let mut actual = spst.clone();
        let branch = actual.purify(target).unwrap();
        actual.backward(branch).unwrap();
        prop_assert_eq!(actual.root_state().unwrap(), predicted);
    }

    /// Expected attempts per link add up to the root cost.
    #[test]
    fn test_expected_allocation_sums_to_root_cost(
        fids in arb_fids(12),
        gate in arb_gate(),
        strategy in arb_strategy(),
    ) {
        let spst = build(&fids, gate, strategy);
        let total: f64 = spst.expected_allocation().unwrap().values().sum();
        let (_, cost) = spst.root_state().unwrap();
        prop_assert!((total - cost).abs() <= 1e-9 * cost);

        let pairs: u32 = spst.allocation().unwrap().values().sum();
        prop_assert_eq!(pairs as usize, fids.len());
    }
}
