//! Property tests for [`ChatTree`] under random sequences of operations.
//!
//! Each case starts from a tree with a system root and applies a random mix
//! of appends, edits, leaf switches and sibling navigation. Operations pick
//! their target by index into the ids created so far, so every generated
//! sequence is valid to replay. After each step the tree must validate, the
//! active path must run root-to-leaf, and edits must leave the original
//! message untouched.

use atelier_core::Clock;
use atelier_tree::{ChatTree, Direction, MessageNode, NodeId, Role, TreeError};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Append(Role),
    Edit(usize),
    Switch(usize),
    Navigate(usize, Direction),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop_oneof![Just(Role::User), Just(Role::Assistant)].prop_map(Op::Append),
        2 => any::<usize>().prop_map(Op::Edit),
        1 => any::<usize>().prop_map(Op::Switch),
        1 => (any::<usize>(), prop_oneof![Just(Direction::Previous), Just(Direction::Next)])
            .prop_map(|(i, d)| Op::Navigate(i, d)),
    ]
}

fn pick(ids: &[NodeId], index: usize) -> NodeId {
    ids[index % ids.len()].clone()
}

fn check_active_path(tree: &ChatTree) -> Result<(), TestCaseError> {
    let leaf = tree.current_leaf().cloned().expect("non-empty tree has a leaf");
    let path: Vec<_> = tree.active_path().collect();
    prop_assert_eq!(path.len(), tree.depth(&leaf).unwrap() + 1);
    prop_assert_eq!(Some(&path[0].id), tree.root());
    prop_assert_eq!(&path[path.len() - 1].id, &leaf);
    for pair in path.windows(2) {
        prop_assert_eq!(pair[1].parent(), Some(&pair[0].id));
    }
    Ok(())
}

mod prop_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Every reachable state validates and exposes a consistent active path.
        #[test]
        fn prop_random_operations_preserve_invariants(ops in prop::collection::vec(arb_op(), 1..40)) {
            let clock = Clock::default();
            let mut tree = ChatTree::new();
            let root = tree.append(MessageNode::new(Role::System, "root", clock.now())).unwrap();
            let mut ids = vec![root.clone()];

            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Append(role) => {
                        let id = tree.append(MessageNode::new(role, format!("m{step}"), clock.now())).unwrap();
                        prop_assert_eq!(tree.current_leaf(), Some(&id));
                        ids.push(id);
                    }
                    Op::Edit(i) => {
                        let target = pick(&ids, i);
                        let before = tree.get(&target).unwrap().clone();
                        match tree.edit_node(&target, format!("e{step}")) {
                            Ok(id) => {
                                let after = tree.get(&target).unwrap();
                                prop_assert_eq!(&after.content, &before.content);
                                prop_assert_eq!(after.children(), before.children());
                                let sibling = tree.get(&id).unwrap();
                                prop_assert_eq!(sibling.parent(), before.parent());
                                prop_assert_eq!(sibling.role, before.role);
                                ids.push(id);
                            }
                            Err(TreeError::InvalidState(_)) => prop_assert_eq!(&target, &root),
                            Err(other) => prop_assert!(false, "unexpected error: {other}"),
                        }
                    }
                    Op::Switch(i) => {
                        let target = pick(&ids, i);
                        tree.switch_leaf(&target).unwrap();
                        prop_assert_eq!(tree.current_leaf(), Some(&target));
                    }
                    Op::Navigate(i, direction) => {
                        let target = pick(&ids, i);
                        let before = tree.current_leaf().cloned();
                        match tree.navigate_to_sibling(&target, direction).unwrap() {
                            Some(tip) => {
                                prop_assert!(tree.get(&tip).unwrap().is_leaf());
                                prop_assert_eq!(tree.current_leaf(), Some(&tip));
                            }
                            None => prop_assert_eq!(tree.current_leaf().cloned(), before),
                        }
                    }
                }

                prop_assert!(tree.validate().is_ok(), "{:?}", tree.validate());
                prop_assert_eq!(tree.len(), ids.len());
                check_active_path(&tree)?;
            }
        }

        /// Splitting at any node yields a valid single-path tree ending at that node.
        #[test]
        fn prop_split_is_a_valid_path(appends in 1..12usize, edits in prop::collection::vec(any::<usize>(), 0..6), at in any::<usize>()) {
            let clock = Clock::default();
            let mut tree = ChatTree::new();
            let mut ids = Vec::new();
            for n in 0..appends {
                ids.push(tree.append(MessageNode::new(Role::User, format!("m{n}"), clock.now())).unwrap());
            }
            for e in edits {
                if let Ok(id) = tree.edit_node(&pick(&ids, e), "edit") {
                    ids.push(id);
                }
            }

            let target = pick(&ids, at);
            let split = tree.split_at(&target).unwrap();
            prop_assert!(split.validate().is_ok());
            prop_assert_eq!(split.current_leaf(), Some(&target));
            prop_assert_eq!(split.len(), tree.depth(&target).unwrap() + 1);
            prop_assert_eq!(split.leaves(), vec![&target]);
        }
    }
}

#[test]
fn serialized_tree_round_trips_and_validates() {
    let clock = Clock::default();
    let mut tree = ChatTree::new();
    let q = tree.append(MessageNode::new(Role::User, "q", clock.now())).unwrap();
    tree.append(MessageNode::new(Role::Assistant, "a1", clock.now())).unwrap();
    let a2 = tree.append(MessageNode::new(Role::User, "follow-up", clock.now())).unwrap();
    tree.edit_node(&a2, "other follow-up").unwrap();
    tree.toggle_pin(&q).unwrap();

    let json = serde_json::to_string(&tree).unwrap();
    let restored: ChatTree = serde_json::from_str(&json).unwrap();

    assert!(restored.validate().is_ok());
    assert_eq!(restored.current_leaf(), tree.current_leaf());
    assert!(restored.get(&q).unwrap().pinned);
    let contents: Vec<_> = restored.active_path().map(|n| n.content.clone()).collect();
    assert_eq!(contents, ["q", "a1", "other follow-up"]);
}
