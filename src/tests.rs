extern crate std;

use std::{collections::BTreeMap, fmt::Write, ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

// Renders the shape of the tree as `key(left,right)`, with `.` for a missing child.
fn shape(tree: &AvlTree<TestNode>) -> String {
    fn render(tree: &AvlTree<TestNode>, node: Link<TestNode>, out: &mut String) {
        let Some(node) = node else {
            out.push('.');
            return;
        };

        let links = unsafe { tree.links(node) };
        write!(out, "{}", unsafe { node.as_ref() }.key).unwrap();

        if links.left().is_some() || links.right().is_some() {
            out.push('(');
            render(tree, links.left(), out);
            out.push(',');
            render(tree, links.right(), out);
            out.push(')');
        }
    }

    let mut out = String::new();
    render(tree, tree.root, &mut out);
    out
}

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn balance_of(tree: &AvlTree<TestNode>, key: u32) -> i8 {
    let node = tree.get_raw(&key).expect("item not found");
    unsafe { tree.links(node).balance() }
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(tree.len(), keys.len());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut Vec<u32>, k: usize, f: &mut impl FnMut(&[u32])) {
    if k == keys.len() {
        f(keys);
        return;
    }

    for i in k..keys.len() {
        keys.swap(k, i);
        for_each_permutation(keys, k + 1, f);
        keys.swap(k, i);
    }
}

#[test]
fn five_elems_find() {
    for_each_permutation(&mut (0..5).collect(), 0, &mut insert_find_all);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.remove(key).map(|node| node.key), Some(*key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_six() {
    for_each_permutation(&mut (0..6).collect(), 0, &mut insert_remove_all);
}

#[test]
fn rotate_primitives() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
    assert_eq!(shape(&tree), "4(2(1,3),6(5,7))");

    let root = tree.root.unwrap();
    unsafe { tree.rotate(root, Dir::Right) };
    assert_eq!(shape(&tree), "2(1,4(3,6(5,7)))");
    assert_eq!(tree.root.map(|r| unsafe { r.as_ref() }.key), Some(2));

    // Rotating back restores the original shape, root included.
    let root = tree.root.unwrap();
    unsafe { tree.rotate(root, Dir::Left) };
    assert_eq!(shape(&tree), "4(2(1,3),6(5,7))");

    // Below the root, the parent's child link is updated instead.
    let six = tree.get_raw(&6).unwrap();
    unsafe { tree.rotate(six, Dir::Left) };
    assert_eq!(shape(&tree), "4(2(1,3),7(6(5,.),.))");

    let seven = tree.get_raw(&7).unwrap();
    unsafe {
        assert_eq!(tree.links(seven).parent(), tree.root);
        assert_eq!(tree.links(six).parent(), Some(seven));
    }

    // Balance factors are left to the caller; put the tree back before it is dropped.
    unsafe { tree.rotate(seven, Dir::Right) };
    assert_eq!(shape(&tree), "4(2(1,3),6(5,7))");
    tree.assert_invariants();
}

#[test]
fn insert_zig_zig() {
    assert_eq!(shape(&tree_of(&[1, 2, 3])), "2(1,3)");
    assert_eq!(shape(&tree_of(&[3, 2, 1])), "2(1,3)");
}

#[test]
fn insert_zig_zag() {
    assert_eq!(shape(&tree_of(&[3, 1, 2])), "2(1,3)");
    assert_eq!(shape(&tree_of(&[1, 3, 2])), "2(1,3)");

    // The inserted node's subtree leaned left, so the old grandparent ends up right-heavy.
    let tree = tree_of(&[5, 2, 8, 1, 4, 3]);
    assert_eq!(shape(&tree), "4(2(1,3),5(.,8))");
    assert_eq!(balance_of(&tree, 4), 0);
    assert_eq!(balance_of(&tree, 2), 0);
    assert_eq!(balance_of(&tree, 5), 1);

    // Mirrored.
    let tree = tree_of(&[4, 7, 1, 8, 5, 6]);
    assert_eq!(shape(&tree), "5(4(1,.),7(6,8))");
    assert_eq!(balance_of(&tree, 4), -1);
    assert_eq!(balance_of(&tree, 7), 0);
}

#[test]
fn second_child_stops_propagation() {
    let mut tree = tree_of(&[5, 3, 7, 4]);
    assert_eq!(balance_of(&tree, 3), 1);
    assert_eq!(balance_of(&tree, 5), -1);

    tree.insert(TestNode::new(2));
    tree.assert_invariants();
    assert_eq!(balance_of(&tree, 3), 0);
    assert_eq!(balance_of(&tree, 5), -1);
    assert_eq!(shape(&tree), "5(3(2,4),7)");
}

#[test]
fn remove_sibling_balanced_stops() {
    let mut tree = tree_of(&[2, 1, 4, 3, 5]);
    assert_eq!(shape(&tree), "2(1,4(3,5))");

    tree.remove(&1);
    tree.assert_invariants();
    assert_eq!(shape(&tree), "4(2(.,3),5)");
    assert_eq!(balance_of(&tree, 2), 1);
    assert_eq!(balance_of(&tree, 4), -1);
}

#[test]
fn remove_zig_zag() {
    let mut tree = tree_of(&[2, 1, 4, 3]);
    assert_eq!(shape(&tree), "2(1,4(3,.))");

    tree.remove(&1);
    tree.assert_invariants();
    assert_eq!(shape(&tree), "3(2,4)");
}

#[test]
fn remove_cascades_to_root() {
    // Removing 16 unbalances 15, and the rotation there shortens the right subtree of the root
    // enough to unbalance it in turn.
    let mut tree = tree_of(&[19, 1, 18, 14, 16, 15, 13, 11, 10, 5, 12, 0]);
    assert_eq!(
        shape(&tree),
        "14(11(5(1(0,.),10),13(12,.)),16(15,18(.,19)))"
    );
    assert_eq!(tree.height(), 5);

    tree.remove(&16);
    tree.assert_invariants();
    assert_eq!(
        shape(&tree),
        "11(5(1(0,.),10),14(13(12,.),18(15,19)))"
    );
    assert_eq!(tree.height(), 4);
}

#[test]
fn remove_two_children_keeps_identity() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
    let two = tree.get_raw(&2).unwrap();
    let three = tree.get_raw(&3).unwrap();

    // 4 trades places with its predecessor 3 before being unlinked.
    let removed = tree.remove(&4).unwrap();
    assert_eq!(removed.key, 4);
    tree.assert_invariants();
    assert_eq!(shape(&tree), "3(2(1,.),6(5,7))");

    // Every other item is still where it was.
    assert_eq!(tree.get_raw(&3), Some(three));
    assert_eq!(tree.get_raw(&2), Some(two));
    assert_eq!(tree.root, Some(three));
}

#[test]
fn remove_two_children_adjacent_predecessor() {
    let mut tree = tree_of(&[2, 1, 3]);

    // The predecessor of 2 is its own left child.
    tree.remove(&2);
    tree.assert_invariants();
    assert_eq!(shape(&tree), "1(.,3)");
}

#[test]
fn swap_positions_siblings() {
    let mut tree = tree_of(&[2, 1, 3]);
    let one = tree.get_raw(&1).unwrap();
    let three = tree.get_raw(&3).unwrap();

    unsafe { tree.swap_positions(one, three) };
    assert_eq!(shape(&tree), "2(3,1)");

    unsafe { tree.swap_positions(one, three) };
    assert_eq!(shape(&tree), "2(1,3)");
    tree.assert_invariants();
}

#[test]
fn scripted_insert_remove_scenario() {
    let mut tree = tree_of(&[5, 3, 7, 4, 6, 9, 10]);
    assert_eq!(shape(&tree), "5(3(.,4),7(6,9(.,10)))");

    let steps = [
        (5, "7(4(3,6),9(.,10))"),
        (9, "7(4(3,6),10)"),
        (3, "7(4(.,6),10)"),
        (7, "6(4,10)"),
        (4, "6(.,10)"),
        (10, "6"),
        (10, "6"),
        (6, "."),
    ];

    for (key, expected) in steps {
        tree.remove(&key);
        tree.assert_invariants();
        assert_eq!(shape(&tree), expected, "after removing {key}");
    }

    assert!(tree.is_empty());
}

#[test]
fn ascending_inserts_stay_shallow() {
    let tree = tree_of(&(1..=18).collect::<Vec<_>>());
    assert!(tree.height() <= 5);
    assert!(tree.iter().map(|node| node.key).eq(1..=18));
}

// Upper bound on the height of an AVL tree with `n` nodes.
fn max_height(n: usize) -> f64 {
    1.4405 * ((n + 2) as f64).log2() - 0.3277
}

#[test]
fn insert_then_remove_restores_shape() {
    let mut tree = tree_of(&[40, 20, 60, 10, 30, 50, 70]);
    let before = shape(&tree);

    // None of these insertions rotates, so removing the key again undoes it exactly.
    for key in [5, 15, 25, 35, 45, 55, 65, 75] {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
        assert_ne!(shape(&tree), before);

        tree.remove(&key);
        tree.assert_invariants();
        assert_eq!(shape(&tree), before, "after inserting and removing {key}");
    }
}

#[test]
fn remove_absent_key_is_noop() {
    let mut tree = tree_of(&[5, 3, 7, 4, 6, 9, 10]);
    let before = shape(&tree);

    for key in [0, 8, 11] {
        assert!(tree.remove(&key).is_none());
        assert_eq!(shape(&tree), before);
        assert_eq!(tree.len(), 7);
    }

    let mut empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.remove(&1).is_none());
    assert!(empty.is_empty());
}

#[test]
fn insert_existing_key_replaces_in_place() {
    let mut tree = tree_of(&[5, 3, 7, 4, 6, 9, 10]);
    let before = shape(&tree);
    let balances: Vec<i8> = [5, 3, 7, 4, 6, 9, 10]
        .iter()
        .map(|&key| balance_of(&tree, key))
        .collect();

    for key in [5, 4, 10] {
        let old = tree.get_raw(&key).unwrap();
        let replaced = tree.insert(TestNode::new(key)).expect("key was present");

        assert_eq!(NonNull::from(&*replaced), old);
        assert_ne!(tree.get_raw(&key), Some(old));
        tree.assert_invariants();
        assert_eq!(shape(&tree), before);
    }

    let after: Vec<i8> = [5, 3, 7, 4, 6, 9, 10]
        .iter()
        .map(|&key| balance_of(&tree, key))
        .collect();
    assert_eq!(balances, after);
    assert_eq!(tree.len(), 7);
}

#[test]
fn map_overwrite_keeps_shape() {
    let mut map = AvlMap::new();
    for key in [5, 3, 7, 4, 6, 9, 10] {
        assert_eq!(map.insert(key, key * 10), None);
    }

    let mut before = String::new();
    map.dotgraph("before", &mut before).unwrap();

    assert_eq!(map.insert(4, 0), Some(40));
    assert_eq!(map.get(&4), Some(&0));

    let mut after = String::new();
    map.dotgraph("before", &mut after).unwrap();
    assert_eq!(before, after);
    map.validate().unwrap();
}

#[test]
fn map_basic_operations() {
    let mut map = AvlMap::new();
    assert!(map.is_empty());
    assert_eq!(map.first_key_value(), None);

    for (key, value) in [(2, "two"), (3, "three"), (1, "one"), (4, "four")] {
        map.insert(key, value);
    }

    assert_eq!(map.len(), 4);
    assert!(map.contains_key(&3));
    assert_eq!(map.get(&5), None);
    assert_eq!(map.first_key_value(), Some((&1, &"one")));
    assert_eq!(map.last_key_value(), Some((&4, &"four")));

    if let Some(value) = map.get_mut(&2) {
        *value = "deux";
    }
    assert_eq!(map.get(&2), Some(&"deux"));

    assert_eq!(map.remove(&1), Some("one"));
    assert_eq!(map.remove(&7), None);
    assert_eq!(map.pop_last(), Some((4, "four")));
    assert_eq!(map.pop_first(), Some((2, "deux")));
    assert_eq!(std::format!("{map:?}"), "{3: \"three\"}");

    map.clear();
    assert!(map.is_empty());
    map.validate().unwrap();
}

// Runs a script of insertions (positive) and removals (negative) against an `AvlMap` and a
// `BTreeMap`.
fn run_script(script: &[i32]) -> AvlMap<i32, i32> {
    let mut map = AvlMap::new();
    let mut btree = BTreeMap::new();

    for &step in script {
        if step > 0 {
            assert_eq!(map.insert(step, -step), btree.insert(step, -step));
        } else {
            assert_eq!(map.remove(&-step), btree.remove(&-step));
        }

        if let Err(error) = map.validate() {
            panic!("after step {step}: {error}");
        }
        assert!(map.iter().eq(btree.iter()));
    }

    map
}

#[test]
fn scripted_mixed_sequences() {
    #[rustfmt::skip]
    let map = run_script(&[
        2, 3, 1, 4, -1, 5, -7, -5, 5, 3, -5, -3, 5, 1, 2, 3, -2, 4, 3, 7, -5, -7, -3, 5, 3, 7, 4,
        -5,
    ]);
    assert!(map.iter().map(|(&k, _)| k).eq([1, 3, 4, 7]));

    let map = run_script(&[5, 3, 7, 4, 6, -6, -4]);
    assert!(map.iter().map(|(&k, _)| k).eq([3, 5, 7]));

    let map = run_script(&[5, 3, 7, 4, 6, 9, -5, -7, -6]);
    assert!(map.iter().map(|(&k, _)| k).eq([3, 4, 9]));

    #[rustfmt::skip]
    let map = run_script(&[
        5, 3, 7, 4, 6, 9, 10, 2, 8, 13, 12, 11, -13, -12, -10, -13, -7, -8, -7,
    ]);
    assert!(map.iter().map(|(&k, _)| k).eq([2, 3, 4, 5, 6, 9, 11]));

    let map = run_script(&[10, 3, 2, 15, 12, 11, 14, 13, 16, 17, -15, -10]);
    assert!(map.iter().map(|(&k, _)| k).eq([2, 3, 11, 12, 13, 14, 16, 17]));

    #[rustfmt::skip]
    let map = run_script(&[
        5, 3, 7, 4, 6, 9, 10, 2, 8, 15, 11, 14, 13, 12, -15, -14,
    ]);
    assert!(map.iter().map(|(&k, _)| k).eq(2..=13));

    let map = run_script(&[5, 2, 11, 1, 3, 7, 12, 4, 6, 9, 13, 10, 8, -1]);
    assert!(map.iter().map(|(&k, _)| k).eq((2..=13).filter(|&k| k != 1)));
}

#[test]
fn equal_paths() {
    let empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.has_equal_paths());
    assert_eq!(empty.height(), 0);

    assert!(tree_of(&[1]).has_equal_paths());
    assert!(tree_of(&[2, 1, 3]).has_equal_paths());
    assert!(tree_of(&[4, 2, 6, 1, 3, 5, 7]).has_equal_paths());

    // A lone child only needs equal paths below itself.
    assert!(tree_of(&[2, 1]).has_equal_paths());
    assert!(tree_of(&[4, 2, 6, 1, 5]).has_equal_paths());

    assert!(!tree_of(&[3, 2, 4, 1]).has_equal_paths());
    assert!(!tree_of(&[4, 2, 6, 1, 3, 5, 7, 0]).has_equal_paths());
}

#[test]
fn validate_reports_broken_balance() {
    let mut tree = tree_of(&[2, 1, 3]);
    assert_eq!(tree.validate(), Ok(()));

    let root = tree.root.unwrap();
    unsafe { tree.links_mut(root).set_balance(1) };

    assert_eq!(
        tree.validate(),
        Err(InvariantError::BalanceMismatch {
            key: "2".into(),
            stored: 1,
            actual: 0,
        })
    );

    unsafe { tree.links_mut(root).set_balance(0) };
    tree.assert_invariants();
}

#[test]
fn iter_and_cursors() {
    let mut tree = tree_of(&[5, 3, 7, 4, 6, 9, 10]);

    let iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert!(iter.map(|node| node.key).eq([3, 4, 5, 6, 7, 9, 10]));

    let mut cursor = tree.cursor_last();
    assert_eq!(cursor.get().map(|node| node.key), Some(10));
    cursor.move_next();
    assert!(cursor.get().is_none());
    assert_eq!(cursor.peek_next().map(|node| node.key), Some(3));
    assert_eq!(cursor.peek_prev().map(|node| node.key), Some(10));

    let mut cursor = tree.cursor_first_mut();
    cursor.move_next();
    cursor.move_next();
    assert_eq!(cursor.remove_current().map(|node| node.key), Some(5));
    assert_eq!(cursor.get().map(|node| node.key), Some(6));
    assert_eq!(
        cursor.remove_current_and_move_prev().map(|node| node.key),
        Some(6)
    );
    assert_eq!(cursor.get().map(|node| node.key), Some(4));

    tree.assert_invariants();
    assert!(tree.iter().map(|node| node.key).eq([3, 4, 7, 9, 10]));
}

#[test]
fn entry_api() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    match tree.entry(&3) {
        Entry::Vacant(entry) => {
            assert_eq!(*entry.key(), 3);
            unsafe { entry.insert(TestNode::new(3)) };
        }
        Entry::Occupied(_) => panic!("empty tree has no occupied entries"),
    }

    for key in [1, 2] {
        if let Entry::Vacant(entry) = tree.entry(&key) {
            unsafe { entry.insert(TestNode::new(key)) };
        }
        tree.assert_invariants();
    }
    assert_eq!(shape(&tree), "2(1,3)");

    match tree.entry(&2) {
        Entry::Occupied(mut entry) => {
            assert_eq!(entry.get().key, 2);
            let old = unsafe { entry.insert(TestNode::new(2)) };
            assert_eq!(old.key, 2);
            assert_eq!(entry.remove().key, 2);
        }
        Entry::Vacant(_) => panic!("2 was inserted"),
    }

    tree.assert_invariants();
    assert_eq!(tree.len(), 2);
}

#[test]
fn pop_and_clear() {
    let mut tree = tree_of(&(0..32).collect::<Vec<_>>());

    assert_eq!(tree.first().map(|node| node.key), Some(0));
    assert_eq!(tree.last().map(|node| node.key), Some(31));
    assert_eq!(tree.pop_first().map(|node| node.key), Some(0));
    assert_eq!(tree.pop_last().map(|node| node.key), Some(31));
    tree.assert_invariants();

    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.first().is_none());
    tree.assert_invariants();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        keys in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(keys, ops);
    }

    #[test]
    fn height_bound(keys in proptest::collection::vec(any::<u32>(), 0..500)) {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in keys {
            tree.insert(TestNode::new(key));
        }

        tree.assert_invariants();
        prop_assert!(tree.height() as f64 <= max_height(tree.len()));
    }
}
