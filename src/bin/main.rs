use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct DemoNode {
    links: Links<DemoNode>,
    key: u32,
}

impl DemoNode {
    fn new(key: u32) -> Box<DemoNode> {
        Box::new(DemoNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<DemoNode>> for DemoNode {
    type Handle = Box<DemoNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<DemoNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<DemoNode>> for DemoNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

fn keys(tree: &AvlTree<DemoNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn main() {
    let mut tree: AvlTree<DemoNode> = AvlTree::new();

    for key in [5, 3, 7, 4, 6, 9, 10, 2, 8, 15, 11, 14, 13, 12] {
        tree.insert(DemoNode::new(key));
        tree.assert_invariants();
    }
    println!("{:?} (height {})", keys(&tree), tree.height());

    for key in [15, 14] {
        let removed = tree.remove(&key).unwrap();
        assert_eq!(removed.key, key);
        tree.assert_invariants();
    }
    println!("{:?} (height {})", keys(&tree), tree.height());

    let mut dot = String::new();
    tree.dotgraph("demo", &mut dot).unwrap();
    println!("{dot}");

    while let Some(node) = tree.pop_first() {
        tree.assert_invariants();
        print!("{} ", node.key);
    }
    println!();
}
