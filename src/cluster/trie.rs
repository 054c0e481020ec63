//! Path-compressed binary trie keyed on fixed-length bit vectors.
//!
//! Each node covers the key bits `[bias, bias + segment.len())`. A branch's
//! two children both start at the bit right after the branch's segment, and
//! the first bit of a child's segment is the bit value that selects it. A
//! leaf's segment always runs to the end of the key.
//!
//! Nodes live in an arena and link to each other by index, so splitting a
//! node is a matter of rewriting a few index fields.

use crate::core::{BitVector, Error, Result};

#[derive(Debug, Clone, Copy)]
enum Link {
    Branch([usize; 2]),
    Leaf(usize),
}

#[derive(Debug, Clone)]
struct Node {
    bias: usize,
    segment: BitVector,
    parent: Option<usize>,
    link: Link,
}

/// Binary trie mapping distinct bit vectors to payloads.
///
/// Lookup and insertion cost O(key length), independent of how many keys the
/// trie already holds.
#[derive(Debug, Clone)]
pub struct Trie<P> {
    nodes: Vec<Node>,
    payloads: Vec<P>,
    root: Option<usize>,
    width: Option<usize>,
}

impl<P> Default for Trie<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Trie<P> {
    /// Empty trie; the first inserted key fixes the key width.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            payloads: Vec::new(),
            root: None,
            width: None,
        }
    }

    /// Empty trie accepting only keys of `width` bits.
    pub fn with_width(width: usize) -> Self {
        Self {
            width: Some(width),
            ..Self::new()
        }
    }

    /// Key width, once known.
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// True if no key was inserted yet.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Number of arena nodes (branches and leaves).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Payloads in first-insertion order.
    pub fn values(&self) -> impl Iterator<Item = &P> {
        self.payloads.iter()
    }

    /// Look up the payload stored under `key`.
    pub fn get(&self, key: &BitVector) -> Result<Option<&P>> {
        if self.width.is_none() {
            return Ok(None);
        }
        self.check_width(key)?;
        Ok(match self.descend(key) {
            Descent::Found(slot) => Some(&self.payloads[slot]),
            Descent::Diverged { .. } | Descent::Empty => None,
        })
    }

    /// Return the payload stored under `key`, creating it with `make` on
    /// first sight. The flag is true when a new key was inserted.
    pub fn get_or_insert_with(
        &mut self,
        key: &BitVector,
        make: impl FnOnce() -> P,
    ) -> Result<(&mut P, bool)> {
        match self.width {
            Some(_) => self.check_width(key)?,
            None => self.width = Some(key.len()),
        }

        let slot = match self.descend(key) {
            Descent::Found(slot) => return Ok((&mut self.payloads[slot], false)),
            Descent::Empty => {
                let slot = self.push_payload(make());
                let leaf = self.push_node(Node {
                    bias: 0,
                    segment: key.clone(),
                    parent: None,
                    link: Link::Leaf(slot),
                });
                self.root = Some(leaf);
                slot
            }
            Descent::Diverged { node, offset } => {
                let slot = self.push_payload(make());
                self.split(node, offset, key, slot)?;
                slot
            }
        };
        Ok((&mut self.payloads[slot], true))
    }

    fn descend(&self, key: &BitVector) -> Descent {
        let Some(mut current) = self.root else {
            return Descent::Empty;
        };
        loop {
            let node = &self.nodes[current];
            if let Some(offset) = first_mismatch(key, node) {
                return Descent::Diverged {
                    node: current,
                    offset,
                };
            }
            match node.link {
                Link::Leaf(slot) => return Descent::Found(slot),
                Link::Branch(children) => {
                    let next_bit = node.bias + node.segment.len();
                    current = children[usize::from(key.bit(next_bit))];
                }
            }
        }
    }

    /// Replace `node` by a branch holding the common prefix, with the old
    /// node and a fresh leaf for `key` as its children.
    fn split(&mut self, node: usize, offset: usize, key: &BitVector, slot: usize) -> Result<()> {
        let (bias, parent, prefix, suffix) = {
            let old = &self.nodes[node];
            (
                old.bias,
                old.parent,
                old.segment.slice(0, offset)?,
                old.segment.slice(offset, old.segment.len())?,
            )
        };
        let diverge_at = bias + offset;
        let width = key.len();
        let branch = self.nodes.len();
        let leaf = branch + 1;

        let key_bit = usize::from(key.bit(diverge_at));
        let mut children = [node; 2];
        children[key_bit] = leaf;

        self.push_node(Node {
            bias,
            segment: prefix,
            parent,
            link: Link::Branch(children),
        });
        self.push_node(Node {
            bias: diverge_at,
            segment: key.slice(diverge_at, width)?,
            parent: Some(branch),
            link: Link::Leaf(slot),
        });

        let old = &mut self.nodes[node];
        old.bias = diverge_at;
        old.segment = suffix;
        old.parent = Some(branch);

        match parent {
            Some(p) => {
                if let Link::Branch(ref mut siblings) = self.nodes[p].link {
                    for child in siblings.iter_mut().filter(|c| **c == node) {
                        *child = branch;
                    }
                }
            }
            None => self.root = Some(branch),
        }
        Ok(())
    }

    fn push_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn push_payload(&mut self, payload: P) -> usize {
        self.payloads.push(payload);
        self.payloads.len() - 1
    }

    fn check_width(&self, key: &BitVector) -> Result<()> {
        match self.width {
            Some(width) if width != key.len() => Err(Error::length_mismatch(width, key.len())),
            _ => Ok(()),
        }
    }
}

enum Descent {
    Empty,
    Found(usize),
    Diverged { node: usize, offset: usize },
}

fn first_mismatch(key: &BitVector, node: &Node) -> Option<usize> {
    (0..node.segment.len()).find(|&k| key.bit(node.bias + k) != node.segment.bit(k))
}
