//! Integration tests for scheme-tree construction, gradients and mutation.

use qupath_phys::{Edge, EntType, Fidelity, Gate, HardwarePreset, HardwareProfile, OpKind};
use qupath_tree::{BuildStrategy, NodeAttr, NodeIndex, NodeKind, NodeType, Spst, TreeError};

fn path(fids: &[f64]) -> Vec<(Edge, Fidelity)> {
    fids.iter()
        .enumerate()
        .map(|(i, &f)| (Edge::from((i as u32, i as u32 + 1)), f))
        .collect()
}

fn werner() -> Gate {
    let hw = HardwareProfile::new(0.99, 0.99, 0.99, 0.9).unwrap();
    Gate::new(EntType::Werner, hw).unwrap()
}

fn built(fids: &[f64], gate: Gate, strategy: BuildStrategy) -> Spst {
    let mut spst = Spst::new(path(fids), gate).unwrap();
    spst.build(strategy, None).unwrap();
    spst
}

/// Every branch agrees with a fresh evaluation of its children.
fn assert_consistent(spst: &Spst) {
    let tree = spst.tree();
    let root = spst.root().expect("tree is built");
    for i in tree.preorder(root) {
        let node = &tree[i];
        let NodeKind::Branch {
            left,
            right,
            op,
            prob,
        } = *node.kind()
        else {
            continue;
        };
        let (l, r) = (&tree[left], &tree[right]);
        let (f, p) = spst.gate().apply(op, l.fidelity, r.fidelity);
        assert_eq!(node.fidelity, f, "fidelity of {i}");
        assert_eq!(prob, p, "probability of {i}");
        let expected = (l.cost + r.cost) / prob;
        assert!(
            (node.cost - expected).abs() <= 1e-12 * expected,
            "cost of {i}: {} != {expected}",
            node.cost
        );
        assert_eq!(l.parent(), Some(i));
        assert_eq!(r.parent(), Some(i));
    }
}

/// Centered finite difference of the root fidelity w.r.t. node `idx`.
fn fd_root_fidelity(spst: &Spst, idx: NodeIndex) -> f64 {
    let h = 1e-6;
    let f0 = spst.node(idx).unwrap().fidelity;
    let mut shifted = spst.clone();
    shifted.set_fidelity(idx, f0 + h).unwrap();
    let up = shifted.root_state().unwrap().0;
    shifted.set_fidelity(idx, f0 - h).unwrap();
    let down = shifted.root_state().unwrap().0;
    (up - down) / (2.0 * h)
}

fn assert_gradients_match(spst: &mut Spst) {
    spst.grad_root().unwrap();
    let root = spst.root().unwrap();
    let nodes: Vec<NodeIndex> = spst.tree().preorder(root).collect();
    for i in nodes {
        let analytic = spst.node(i).unwrap().grad.fidelity;
        let numeric = fd_root_fidelity(spst, i);
        assert!(
            (analytic - numeric).abs() < 1e-6,
            "node {i}: analytic {analytic} vs numeric {numeric}"
        );
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn build_is_consistent_for_every_strategy() {
    let fids = [0.95, 0.91, 0.97, 0.93, 0.96];
    for gate in [Gate::dephased_perfect(), werner()] {
        for strategy in BuildStrategy::IMPLEMENTED {
            let spst = built(&fids, gate, strategy);
            assert_consistent(&spst);
            assert_eq!(spst.strategy(), Some(strategy));
        }
    }
}

#[test]
fn leaf_costs_are_default_or_overridden() {
    let mut spst = Spst::new(path(&[0.9, 0.9, 0.9]), werner()).unwrap();
    let root = spst.build(BuildStrategy::Balanced, None).unwrap();
    for leaf in spst.tree().leaves(root) {
        assert_eq!(spst.node(leaf).unwrap().cost, 1.0);
    }

    let root = spst
        .build(BuildStrategy::Balanced, Some(&[2.0, 3.0, 4.0]))
        .unwrap();
    let costs: Vec<f64> = spst
        .tree()
        .leaves(root)
        .into_iter()
        .map(|i| spst.node(i).unwrap().cost)
        .collect();
    assert_eq!(costs, vec![2.0, 3.0, 4.0]);
    assert_consistent(&spst);
}

#[test]
fn balanced_build_keeps_every_leaf() {
    for n in 1..=12 {
        let fids = vec![0.9; n];
        let spst = built(&fids, werner(), BuildStrategy::Balanced);
        let root = spst.root().unwrap();
        let leaves = spst.tree().leaves(root);
        assert_eq!(leaves.len(), n);
        let edges: Vec<Edge> = leaves.iter().map(|&i| spst.node(i).unwrap().edge).collect();
        assert_eq!(edges, spst.edges());
        assert_eq!(spst.node(root).unwrap().edge, Edge::from((0, n as u32)));
        assert!(spst.node(root).unwrap().is_root());
    }
}

#[test]
fn single_link_tree_is_a_leaf_root() {
    let spst = built(&[0.8], werner(), BuildStrategy::Balanced);
    let root = spst.node(spst.root().unwrap()).unwrap();
    assert!(root.is_leaf());
    assert!(root.is_root());
    assert_eq!(spst.tree().len(), 1);
}

#[test]
fn two_links_give_one_branch_for_every_strategy() {
    for strategy in BuildStrategy::IMPLEMENTED {
        let spst = built(&[0.9, 0.8], werner(), strategy);
        let root = spst.node(spst.root().unwrap()).unwrap();
        let (l, r) = root.children().expect("root is a branch");
        assert_eq!(spst.node(l).unwrap().edge, Edge::from((0, 1)));
        assert_eq!(spst.node(r).unwrap().edge, Edge::from((1, 2)));
        assert!(spst.node(l).unwrap().is_leaf());
        assert!(spst.node(r).unwrap().is_leaf());

        let expected_op = match strategy {
            BuildStrategy::Linked => OpKind::Purify,
            _ => OpKind::Swap,
        };
        assert_eq!(root.op(), Some(expected_op));
        assert_eq!(root.fidelity, spst.gate().apply(expected_op, 0.9, 0.8).0);
    }
}

#[test]
fn rebuild_discards_previous_tree() {
    let mut spst = Spst::new(path(&[0.9, 0.9, 0.9, 0.9]), werner()).unwrap();
    spst.build(BuildStrategy::Linked, None).unwrap();
    let root = spst.build(BuildStrategy::Balanced, None).unwrap();
    assert_eq!(spst.tree().len(), 7);
    assert_eq!(spst.tree().height(root), 2);
}

// ---------------------------------------------------------------------------
// Gradients
// ---------------------------------------------------------------------------

#[test]
fn werner_gradients_match_finite_differences() {
    let mut spst = built(&[0.95, 0.9, 0.97, 0.92, 0.94], werner(), BuildStrategy::Balanced);
    assert_gradients_match(&mut spst);
}

#[test]
fn dephased_gradients_match_finite_differences() {
    let mut spst = built(&[0.95, 0.9, 0.97, 0.92], Gate::dephased_perfect(), BuildStrategy::StOpt);
    assert_gradients_match(&mut spst);
}

#[test]
fn purify_chain_gradients_match_finite_differences() {
    for gate in [Gate::dephased_perfect(), werner()] {
        let mut spst = built(&[0.9, 0.85, 0.8], gate, BuildStrategy::Linked);
        assert_gradients_match(&mut spst);
    }
}

#[test]
fn gradients_match_after_purification() {
    let mut spst = built(&[0.95, 0.9, 0.97], werner(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    let leaf = spst.tree().leaves(root)[1];
    spst.purify(leaf).unwrap();
    assert_gradients_match(&mut spst);
}

#[test]
fn root_gradient_is_identity() {
    let mut spst = built(&[0.9, 0.9], werner(), BuildStrategy::Balanced);
    spst.grad_root().unwrap();
    let root = spst.root_node().unwrap();
    assert_eq!(root.grad.fidelity, 1.0);
    assert_eq!(root.grad.cost_count, 1.0);
    assert_eq!(root.grad.cost_fidelity, 1.0);
}

#[test]
fn cost_count_gradients_distribute_root_cost() {
    let mut spst = built(&[0.95, 0.9, 0.97, 0.92, 0.94], werner(), BuildStrategy::StOpt);
    let root = spst.root().unwrap();
    let leaf = spst.tree().leaves(root)[2];
    spst.purify(leaf).unwrap();
    spst.grad_root().unwrap();

    let root = spst.root().unwrap();
    let total: f64 = spst
        .tree()
        .leaves(root)
        .into_iter()
        .map(|i| {
            let node = spst.node(i).unwrap();
            node.cost * node.grad.cost_count
        })
        .sum();
    let (_, cost) = spst.root_state().unwrap();
    assert!((total - cost).abs() < 1e-9 * cost);

    let exp = spst.expected_allocation().unwrap();
    let alloc_total: f64 = exp.values().sum();
    assert!((alloc_total - cost).abs() < 1e-9 * cost);
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

#[test]
fn purify_keeps_tree_consistent() {
    let mut spst = built(&[0.95, 0.9, 0.97, 0.92], werner(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    let targets: Vec<NodeIndex> = spst.tree().preorder(root).collect();
    for target in targets {
        let branch = spst.purify(target).unwrap();
        assert_consistent(&spst);
        spst.backward(branch).unwrap();
        assert_consistent(&spst);
    }
}

#[test]
fn purify_places_copy_left_and_original_right() {
    let mut spst = built(&[0.95, 0.9, 0.97], werner(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    let target = spst.node(root).unwrap().left().unwrap();
    let before = spst.node(target).unwrap().clone();

    let branch = spst.purify(target).unwrap();
    let node = spst.node(branch).unwrap();
    assert_eq!(node.op(), Some(OpKind::Purify));
    assert_eq!(node.edge, before.edge);
    assert_eq!(node.right(), Some(target));
    assert_eq!(node.parent(), Some(root));
    assert_eq!(spst.node(root).unwrap().left(), Some(branch));

    let copy = spst.node(node.left().unwrap()).unwrap();
    assert_eq!(copy.fidelity, before.fidelity);
    assert_eq!(copy.cost, before.cost);
    assert_ne!(copy.id, before.id);
    assert_eq!(node.fidelity, spst.gate().purify(before.fidelity, before.fidelity).0);
}

#[test]
fn virtual_purify_predicts_actual_purify() {
    for gate in [Gate::dephased_perfect(), werner()] {
        for strategy in BuildStrategy::IMPLEMENTED {
            let spst = built(&[0.95, 0.9, 0.97, 0.92, 0.94], gate, strategy);
            let root = spst.root().unwrap();
            for target in spst.tree().preorder(root) {
                let before = spst.root_state().unwrap();
                let predicted = spst.virtual_purify(target).unwrap();
                assert_eq!(spst.root_state().unwrap(), before, "virtual purify mutated");

                let mut actual = spst.clone();
                let branch = actual.purify(target).unwrap();
                actual.backward(branch).unwrap();
                assert_eq!(actual.root_state().unwrap(), predicted);
            }
        }
    }
}

#[test]
fn backward_propagates_changes_to_root() {
    let mut spst = built(&[0.9, 0.9, 0.9, 0.9], Gate::dephased_perfect(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    let (left, _) = spst.node(root).unwrap().children().unwrap();
    let before = spst.root_state().unwrap().0;

    spst.set_fidelity(left, 1.0).unwrap();
    let right_f = spst.node(spst.node(root).unwrap().right().unwrap()).unwrap().fidelity;
    assert!((spst.root_state().unwrap().0 - right_f).abs() < 1e-12);
    assert!(spst.root_state().unwrap().0 > before);

    // A branch's own value is not recomputed, only its ancestors.
    spst.backward(left).unwrap();
    assert_eq!(spst.node(left).unwrap().fidelity, 1.0);
}

// ---------------------------------------------------------------------------
// Efficiency
// ---------------------------------------------------------------------------

#[test]
fn efficiency_is_fidelity_gradient_per_cost() {
    let mut spst = built(&[0.95, 0.9, 0.97], werner(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    spst.grad_root().unwrap();
    spst.calc_efficiency(root).unwrap();
    for i in spst.tree().preorder(root) {
        let node = spst.node(i).unwrap();
        assert_eq!(node.efficiency, node.grad.fidelity / node.cost);
    }
    let root_node = spst.node(root).unwrap();
    let gain = spst.gate().purify(root_node.fidelity, root_node.fidelity).0 - root_node.fidelity;
    let expected = gain / (gain + root_node.cost);
    assert!((root_node.adjusted_efficiency - expected).abs() < 1e-12);
}

#[test]
fn find_max_respects_type_filter() {
    let mut spst = built(&[0.95, 0.6, 0.97], Gate::dephased_perfect(), BuildStrategy::Balanced);
    let root = spst.root().unwrap();
    spst.grad_root().unwrap();
    spst.calc_efficiency(root).unwrap();

    let leaf = spst
        .find_max(root, NodeAttr::AdjustedEfficiency, &[NodeType::Leaf])
        .unwrap()
        .unwrap();
    assert!(spst.node(leaf).unwrap().is_leaf());

    let best_link = spst
        .find_max(root, NodeAttr::Fidelity, &[NodeType::Leaf])
        .unwrap()
        .unwrap();
    assert_eq!(spst.node(best_link).unwrap().fidelity, 0.97);

    let branch = spst
        .find_max(root, NodeAttr::Cost, &[NodeType::Branch])
        .unwrap()
        .unwrap();
    assert_eq!(branch, root);
    assert_eq!(spst.find_max(root, NodeAttr::Cost, &[]).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unimplemented_strategy_leaves_tree_untouched() {
    let mut spst = built(&[0.9, 0.9], werner(), BuildStrategy::Balanced);
    let before = spst.root_state().unwrap();
    assert!(matches!(
        spst.build(BuildStrategy::PtOpt, None),
        Err(TreeError::NotImplemented(_))
    ));
    assert_eq!(spst.root_state().unwrap(), before);
}

#[test]
fn wrong_cost_override_length_is_rejected() {
    let mut spst = Spst::new(path(&[0.9, 0.9]), werner()).unwrap();
    assert!(matches!(
        spst.build(BuildStrategy::Balanced, Some(&[1.0])),
        Err(TreeError::InvalidArgument(_))
    ));
    assert!(matches!(
        spst.build(BuildStrategy::Balanced, Some(&[1.0, 0.0])),
        Err(TreeError::InvalidArgument(_))
    ));
    assert!(spst.root().is_none());
}

#[test]
fn backward_on_leaf_is_rejected() {
    let mut spst = built(&[0.9, 0.9], werner(), BuildStrategy::Balanced);
    let leaf = spst.tree().leaves(spst.root().unwrap())[0];
    assert!(matches!(spst.backward(leaf), Err(TreeError::InvalidArgument(_))));
}

#[test]
fn unknown_node_is_rejected() {
    let mut spst = built(&[0.9, 0.9], werner(), BuildStrategy::Balanced);
    let bogus = NodeIndex(99);
    assert!(matches!(spst.purify(bogus), Err(TreeError::InvalidNode(_))));
    assert!(matches!(spst.virtual_purify(bogus), Err(TreeError::InvalidNode(_))));
    assert!(matches!(spst.grad(bogus, Default::default()), Err(TreeError::InvalidNode(_))));
    assert_eq!(spst.tree().len(), 3);
}

#[test]
fn queries_before_build_fail() {
    let spst = Spst::new(path(&[0.9]), Gate::werner(HardwarePreset::Low)).unwrap();
    assert!(matches!(spst.root_state(), Err(TreeError::EmptyTree)));
    assert!(matches!(spst.expected_allocation(), Err(TreeError::EmptyTree)));
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[test]
fn render_and_dot_cover_every_node() {
    let spst = built(&[0.9, 0.9, 0.9], werner(), BuildStrategy::Balanced);
    let text = spst.to_string();
    assert_eq!(text.lines().count(), 5);
    assert!(text.starts_with('S'));

    let dot = spst.tree().to_dot(spst.root().unwrap());
    assert!(dot.starts_with("digraph"));
    assert_eq!(dot.matches("->").count(), 4);
}
