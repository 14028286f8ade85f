//! Model-based equivalence checks shared by the proptest suite and the fuzz targets.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlMap, AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// A key operand: either an index into the keys currently present, or an arbitrary key.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Get(ItemValue),
    Remove(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

/// Runs `ops` against both an [`AvlMap`] and a [`BTreeMap`], asserting that every result agrees
/// and that the AVL invariants hold after every operation.
///
/// Values are the index of the operation that stored them, so overwrites are observable.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_keys = Vec::with_capacity(ops.len());
    let mut btree = BTreeMap::new();
    let mut avl = AvlMap::new();

    fn insert_sorted(v: &mut Vec<u32>, key: u32) {
        if let Err(idx) = v.binary_search(&key) {
            v.insert(idx, key);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, key: u32) {
        if let Ok(idx) = v.binary_search(&key) {
            v.remove(idx);
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_keys);

        match final_op {
            FinalOp::Insert(key) => {
                insert_sorted(&mut sorted_keys, key);

                let from_btree = btree.insert(key, op_id);
                let from_avl = avl.insert(key, op_id);

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::Get(key) => {
                let from_btree = btree.get(&key);
                let from_avl = avl.get(&key);

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(key) => {
                remove_sorted(&mut sorted_keys, key);

                let from_btree = btree.remove(&key);
                let from_avl = avl.remove(&key);

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first_key_value();
                let from_avl = avl.first_key_value();

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_avl = avl.pop_first();

                if let Some((key, _)) = from_btree {
                    remove_sorted(&mut sorted_keys, key);
                }

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last_key_value();
                let from_avl = avl.last_key_value();

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_avl = avl.pop_last();

                if let Some((key, _)) = from_btree {
                    remove_sorted(&mut sorted_keys, key);
                }

                assert_eq!(from_btree, from_avl, "Op #{op_id}: {final_op:?}");
            }
        }

        if let Err(error) = avl.validate() {
            panic!("Op #{op_id}: {final_op:?}: {error}");
        }
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().eq(avl.iter()));
    }
}

/// A single step of a cursor walk. The current element is compared after every step.
#[derive(Clone, Debug, Arbitrary)]
pub enum CursorOp {
    MoveNext,
    MovePrev,
    PeekNext,
    PeekPrev,
    RemoveCurrent,
    RemoveCurrentMovePrev,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    proptest::prop_oneof![
        Just(CursorOp::MoveNext),
        Just(CursorOp::MovePrev),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        Just(CursorOp::RemoveCurrent),
        Just(CursorOp::RemoveCurrentMovePrev),
    ]
}

#[derive(Clone, Debug)]
pub struct CursorEquivalenceInput {
    pub keys: Vec<u32>,
    pub ops: Vec<CursorOp>,
}

impl<'a> Arbitrary<'a> for CursorEquivalenceInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_keys = u.int_in_range(0..=99)?;
        let num_ops = u.int_in_range(0..=999)?;

        let mut keys = Vec::with_capacity(num_keys);
        for _ in 0..num_keys {
            keys.push(u.arbitrary().unwrap_or_default());
        }

        let mut ops = Vec::with_capacity(num_ops);
        for _ in 0..num_ops {
            ops.push(u.arbitrary().unwrap_or(CursorOp::MoveNext));
        }

        Ok(CursorEquivalenceInput { keys, ops })
    }
}

// Reference cursor over a sorted, deduplicated `Vec`. Position `keys.len()` is the ghost.
struct VecCursor {
    keys: Vec<u32>,
    pos: usize,
}

impl VecCursor {
    fn current(&self) -> Option<&u32> {
        self.keys.get(self.pos)
    }

    // The position after one step forwards, wrapping through the ghost.
    fn next_pos(&self) -> usize {
        if self.pos == self.keys.len() {
            0
        } else {
            self.pos + 1
        }
    }

    // The position after one step backwards, wrapping through the ghost.
    fn prev_pos(&self) -> usize {
        match self.pos {
            0 => self.keys.len(),
            pos => pos - 1,
        }
    }

    fn remove(&mut self, move_prev: bool) -> Option<u32> {
        if self.pos == self.keys.len() {
            return None;
        }

        let removed = self.keys.remove(self.pos);
        if move_prev {
            // Stepping back from the minimum lands on the ghost.
            self.pos = self.pos.checked_sub(1).unwrap_or(self.keys.len());
        }

        Some(removed)
    }
}

/// Walks a [`CursorMut`](crate::CursorMut) over an [`AvlTree`] of `keys` through `ops`, checking
/// each step against a cursor over a sorted `Vec`.
pub fn run_cursor_equivalence(mut keys: Vec<u32>, ops: Vec<CursorOp>) {
    keys.sort_unstable();
    keys.dedup();

    let mut avl: AvlTree<TestNode> = AvlTree::new();
    for &key in &keys {
        avl.insert(TestNode::new(key));
    }

    let mut model = VecCursor { keys, pos: 0 };
    let mut cursor = avl.cursor_first_mut();

    assert_eq!(model.current(), cursor.get().map(TestNode::key));

    for (op_id, op) in ops.into_iter().enumerate() {
        match op {
            CursorOp::MoveNext => {
                model.pos = model.next_pos();
                cursor.move_next();
            }

            CursorOp::MovePrev => {
                model.pos = model.prev_pos();
                cursor.move_prev();
            }

            CursorOp::PeekNext => {
                let expected = model.keys.get(model.next_pos());
                assert_eq!(
                    expected,
                    cursor.peek_next().map(TestNode::key),
                    "Op #{op_id}: {op:?}"
                );
            }

            CursorOp::PeekPrev => {
                let expected = model.keys.get(model.prev_pos());
                assert_eq!(
                    expected,
                    cursor.peek_prev().map(TestNode::key),
                    "Op #{op_id}: {op:?}"
                );
            }

            CursorOp::RemoveCurrent => {
                let expected = model.remove(false);
                let removed = cursor.remove_current().map(|node| node.key);
                assert_eq!(expected, removed, "Op #{op_id}: {op:?}");
            }

            CursorOp::RemoveCurrentMovePrev => {
                let expected = model.remove(true);
                let removed = cursor.remove_current_and_move_prev().map(|node| node.key);
                assert_eq!(expected, removed, "Op #{op_id}: {op:?}");
            }
        }

        assert_eq!(
            model.current(),
            cursor.get().map(TestNode::key),
            "Op #{op_id}: {op:?}"
        );
    }

    drop(cursor);
    avl.assert_invariants();
    assert!(model.keys.iter().eq(avl.iter().map(TestNode::key)));
}
