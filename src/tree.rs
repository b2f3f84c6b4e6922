use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use tracing::trace;

use crate::{frequency::FrequencyTable, Error, Result};

/// A node of a Huffman tree.
///
/// Each internal node owns exactly two children, so the tree can't share
/// subtrees or form cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf {
        byte: u8,
        count: u64,
    },
    Internal {
        count: u64,
        lo: Box<Node>,
        hi: Box<Node>,
    },
}

impl Node {
    pub fn count(&self) -> u64 {
        match self {
            Node::Leaf { count, .. } | Node::Internal { count, .. } => *count,
        }
    }

    fn merge(lo: Node, hi: Node) -> Node {
        Node::Internal {
            count: lo.count() + hi.count(),
            lo: Box::new(lo),
            hi: Box::new(hi),
        }
    }
}

/// Queue entry. Ordered by count, then by the order nodes entered the queue,
/// so equal counts pop first-in first-out.
struct Queued {
    count: u64,
    seq: usize,
    node: Node,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.count, self.seq).cmp(&(other.count, other.seq))
    }
}

/// A static Huffman tree over the bytes of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    root: Node,
}

impl HuffmanTree {
    /// Build the tree for `frequencies`.
    ///
    /// Returns `Ok(None)` when the table is empty, since there is nothing to
    /// code. A table with a single byte yields a tree whose root is that leaf.
    pub fn build(frequencies: &FrequencyTable) -> Result<Option<Self>> {
        let mut queue: BinaryHeap<Reverse<Queued>> = frequencies
            .iter()
            .enumerate()
            .map(|(seq, (byte, count))| {
                let node = Node::Leaf { byte, count };
                Reverse(Queued { count, seq, node })
            })
            .collect();

        if queue.is_empty() {
            return Ok(None);
        }

        let mut seq = queue.len();
        while queue.len() > 1 {
            let lo = pop(&mut queue)?;
            let hi = pop(&mut queue)?;
            trace!(lo = lo.count(), hi = hi.count(), "merging nodes");

            let node = Node::merge(lo, hi);
            queue.push(Reverse(Queued {
                count: node.count(),
                seq,
                node,
            }));
            seq += 1;
        }

        let root = pop(&mut queue)?;
        Ok(Some(Self { root }))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        let mut stack = vec![&self.root];
        let mut leaves = 0;
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf { .. } => leaves += 1,
                Node::Internal { lo, hi, .. } => {
                    stack.push(lo);
                    stack.push(hi);
                }
            }
        }
        leaves
    }
}

fn pop(queue: &mut BinaryHeap<Reverse<Queued>>) -> Result<Node> {
    match queue.pop() {
        Some(Reverse(queued)) => Ok(queued.node),
        None => Err(Error::InternalInvariantViolation(
            "huffman priority queue underflow",
        )),
    }
}
