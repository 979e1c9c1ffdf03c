//! Fixed-depth append-only commitment tree.
//!
//! Leaves are kept in insertion order and never removed. Roots and proofs
//! are computed from the full leaf set by one routine, [`walk`], so they
//! always agree with each other. Appends additionally keep the rightmost
//! filled node of every level (the same frontier the on-chain tree stores as
//! `subtrees`), which yields the next root in `depth` hashes. The frontier is
//! a cache keyed by leaf count; a stale one is rebuilt from [`walk`].
//!
//! # Padding
//!
//! An odd layer is padded on the right with the zero hash of that level,
//! never with a copy of its last node:
//!
//! ```text
//! depth 2, leaves [1, 2, 3]
//!
//!             root
//!           /      \
//!      H(1,2)      H(3,zero[0])
//!      /    \      /     \
//!     1      2    3     zero[0]
//! ```

use serde::{Deserialize, Serialize};

use crate::{FieldElement, HashError, Hasher, TreeError, error::preview};

/// Largest supported depth.
pub const MAX_DEPTH: usize = 32;

/// Default depth of the pool's commitment trees.
pub const DEFAULT_DEPTH: usize = 20;

/// Path from a leaf to the root.
///
/// `siblings` and `positions` are in leaf-to-root order. Position `0` means
/// the path node is the left child at that level, `1` the right child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    /// Index of the proven leaf
    pub leaf_index: usize,
    /// Root the path hashes up to
    pub root: FieldElement,
    /// Sibling at each level
    pub siblings: Vec<FieldElement>,
    /// Side of the path node at each level
    pub positions: Vec<u8>,
}

impl InclusionProof {
    /// Replay the path from `leaf` and check it reaches [`root`](Self::root).
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if hashing fails.
    pub fn verify(&self, hasher: &mut Hasher, leaf: &FieldElement) -> Result<bool, HashError> {
        if self.siblings.len() != self.positions.len() {
            return Ok(false);
        }
        let mut node = leaf.clone();
        for (sibling, position) in self.siblings.iter().zip(&self.positions) {
            node = match position {
                0 => hasher.hash(&node, sibling)?,
                1 => hasher.hash(sibling, &node)?,
                _ => return Ok(false),
            };
        }
        Ok(node == self.root)
    }
}

/// Zero hashes: `zero[0] = 0`, `zero[i] = H(zero[i-1], zero[i-1])`.
///
/// Holds `depth + 1` entries; the last one is the root of an empty tree.
///
/// # Errors
///
/// Returns a [`HashError`] if hashing fails.
pub fn zero_hashes(hasher: &mut Hasher, depth: usize) -> Result<Vec<FieldElement>, HashError> {
    let mut zeros = Vec::with_capacity(depth + 1);
    zeros.push(FieldElement::zero());
    for level in 0..depth {
        let next = hasher.hash(&zeros[level], &zeros[level])?;
        zeros.push(next);
    }
    Ok(zeros)
}

struct Walk {
    root: FieldElement,
    siblings: Vec<FieldElement>,
    positions: Vec<u8>,
    frontier: Vec<FieldElement>,
}

/// Root and rightmost filled nodes for a given leaf count.
#[derive(Debug, Clone)]
struct Frontier {
    leaf_count: usize,
    root: FieldElement,
    nodes: Vec<FieldElement>,
}

impl Frontier {
    fn empty(zeros: &[FieldElement]) -> Self {
        let depth = zeros.len() - 1;
        Self {
            leaf_count: 0,
            root: zeros[depth].clone(),
            nodes: zeros[..depth].to_vec(),
        }
    }

    /// Frontier after appending `leaf` at index `self.leaf_count`.
    fn advance(
        &self,
        hasher: &mut Hasher,
        zeros: &[FieldElement],
        leaf: &FieldElement,
    ) -> Result<Self, HashError> {
        let mut nodes = self.nodes.clone();
        let mut node = leaf.clone();
        let mut index = self.leaf_count;
        for (level, slot) in nodes.iter_mut().enumerate() {
            node = if index & 1 == 0 {
                *slot = node.clone();
                hasher.hash(&node, &zeros[level])?
            } else {
                hasher.hash(slot, &node)?
            };
            index >>= 1;
        }
        Ok(Self {
            leaf_count: self.leaf_count + 1,
            root: node,
            nodes,
        })
    }
}

/// Compute the root, and the path of `tracked` if given.
fn walk(
    hasher: &mut Hasher,
    leaves: &[FieldElement],
    zeros: &[FieldElement],
    tracked: Option<usize>,
) -> Result<Walk, HashError> {
    let depth = zeros.len() - 1;
    let leaf_count = leaves.len();
    let mut layer = leaves.to_vec();
    let mut index = tracked;
    let mut siblings = Vec::with_capacity(if tracked.is_some() { depth } else { 0 });
    let mut positions = Vec::with_capacity(siblings.capacity());
    let mut frontier = zeros[..depth].to_vec();

    for level in 0..depth {
        let zero = &zeros[level];

        // Only levels where this bit is set are read by the next append
        let complete = leaf_count >> level;
        if complete & 1 == 1 {
            frontier[level] = layer[complete - 1].clone();
        }

        if layer.is_empty() {
            if let Some(i) = index {
                siblings.push(zero.clone());
                positions.push((i & 1) as u8);
            }
            layer = vec![zeros[level + 1].clone()];
            index = index.map(|i| i / 2);
            continue;
        }

        if layer.len() % 2 == 1 {
            layer.push(zero.clone());
        }

        if let Some(i) = index {
            siblings.push(layer.get(i ^ 1).cloned().unwrap_or_else(|| zero.clone()));
            positions.push((i & 1) as u8);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hasher.hash(&pair[0], &pair[1]))
            .collect::<Result<_, _>>()?;
        index = index.map(|i| i / 2);
    }

    let root = layer
        .into_iter()
        .next()
        .unwrap_or_else(|| zeros[depth].clone());

    Ok(Walk {
        root,
        siblings,
        positions,
        frontier,
    })
}

/// Append-only Merkle tree over Poseidon.
#[derive(Debug)]
pub struct CommitmentTree {
    depth: usize,
    leaves: Vec<FieldElement>,
    zeros: Vec<FieldElement>,
    hasher: Hasher,
    frontier: Option<Frontier>,
}

impl CommitmentTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidDepth`] for a depth outside
    /// `1..=MAX_DEPTH`, or a hash error while precomputing zero hashes.
    pub fn new(depth: usize, mut hasher: Hasher) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            });
        }
        let zeros = zero_hashes(&mut hasher, depth)?;
        let frontier = Some(Frontier::empty(&zeros));
        Ok(Self {
            depth,
            leaves: Vec::new(),
            zeros,
            hasher,
            frontier,
        })
    }

    /// Create a tree holding previously persisted leaves.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new), plus [`TreeError::CapacityExceeded`] if
    /// there are more than `2^depth` leaves.
    pub fn with_leaves(
        depth: usize,
        hasher: Hasher,
        leaves: Vec<FieldElement>,
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new(depth, hasher)?;
        if leaves.len() > tree.capacity() {
            return Err(TreeError::CapacityExceeded {
                capacity: tree.capacity(),
            });
        }
        tree.leaves = leaves;
        tree.frontier = None;
        Ok(tree)
    }

    /// Tree depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Maximum number of leaves, `2^depth`.
    pub fn capacity(&self) -> usize {
        1usize << self.depth
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether another append would exceed capacity.
    pub fn is_full(&self) -> bool {
        self.leaves.len() >= self.capacity()
    }

    /// Leaves in insertion order.
    pub fn leaves(&self) -> &[FieldElement] {
        &self.leaves
    }

    /// Zero hash at `level` (`0..=depth`).
    pub fn zero(&self, level: usize) -> Option<&FieldElement> {
        self.zeros.get(level)
    }

    /// Append a leaf, returning its index and the new root.
    ///
    /// The leaf is kept even if hashing the new root fails; the next
    /// [`root`](Self::root) recomputes it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::CapacityExceeded`] when the tree is full (the tree
    /// is unchanged), or [`TreeError::Hash`] if the new root cannot be hashed.
    pub fn append(&mut self, leaf: FieldElement) -> Result<(usize, FieldElement), TreeError> {
        if self.is_full() {
            return Err(TreeError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        let index = self.leaves.len();
        let previous = self.frontier.take();
        self.leaves.push(leaf);
        if let Some(frontier) = previous.filter(|f| f.leaf_count == index) {
            let advanced = frontier.advance(&mut self.hasher, &self.zeros, &self.leaves[index])?;
            self.frontier = Some(advanced);
        }
        let root = self.root()?;
        Ok((index, root))
    }

    #[cfg(test)]
    pub(crate) fn hasher_mut(&mut self) -> &mut Hasher {
        &mut self.hasher
    }

    /// Current root.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Empty`] when the tree has no leaves.
    pub fn root(&mut self) -> Result<FieldElement, TreeError> {
        if self.leaves.is_empty() {
            return Err(TreeError::Empty);
        }
        if let Some(frontier) = &self.frontier
            && frontier.leaf_count == self.leaves.len()
        {
            return Ok(frontier.root.clone());
        }
        let walk = walk(&mut self.hasher, &self.leaves, &self.zeros, None)?;
        self.remember(&walk);
        Ok(walk.root)
    }

    /// Inclusion proof for the leaf at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfRange`] if no leaf exists there.
    pub fn proof(&mut self, index: usize) -> Result<InclusionProof, TreeError> {
        if index >= self.leaves.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                leaf_count: self.leaves.len(),
            });
        }
        let walk = walk(&mut self.hasher, &self.leaves, &self.zeros, Some(index))?;
        self.remember(&walk);
        Ok(InclusionProof {
            leaf_index: index,
            root: walk.root,
            siblings: walk.siblings,
            positions: walk.positions,
        })
    }

    fn remember(&mut self, walk: &Walk) {
        self.frontier = Some(Frontier {
            leaf_count: self.leaves.len(),
            root: walk.root.clone(),
            nodes: walk.frontier.clone(),
        });
    }

    /// Index of the first leaf equal to `commitment`.
    pub fn position(&self, commitment: &FieldElement) -> Option<usize> {
        self.leaves.iter().position(|leaf| leaf == commitment)
    }

    /// Inclusion proof for the earliest leaf equal to `commitment`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Empty`] on an empty tree and
    /// [`TreeError::CommitmentNotFound`] if no leaf matches.
    pub fn proof_by_value(&mut self, commitment: &FieldElement) -> Result<InclusionProof, TreeError> {
        if self.leaves.is_empty() {
            return Err(TreeError::Empty);
        }
        let index = self
            .position(commitment)
            .ok_or_else(|| TreeError::CommitmentNotFound {
                commitment: preview(&commitment.to_string()),
                leaf_count: self.leaves.len(),
            })?;
        self.proof(index)
    }

    /// Hash with this tree's hasher.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if hashing fails.
    pub fn hash(&mut self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement, HashError> {
        self.hasher.hash(left, right)
    }

    /// Check a proof against `leaf` with this tree's hasher.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if hashing fails.
    pub fn verify(&mut self, proof: &InclusionProof, leaf: &FieldElement) -> Result<bool, HashError> {
        proof.verify(&mut self.hasher, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(value: u64) -> FieldElement {
        FieldElement::from(value)
    }

    fn tree(depth: usize) -> CommitmentTree {
        CommitmentTree::new(depth, Hasher::new().unwrap()).unwrap()
    }

    fn h(left: &FieldElement, right: &FieldElement) -> FieldElement {
        Hasher::new().unwrap().hash(left, right).unwrap()
    }

    #[test]
    fn test_zero_hashes_chain() {
        let t = tree(3);
        let z0 = FieldElement::zero();
        let z1 = h(&z0, &z0);
        let z2 = h(&z1, &z1);
        assert_eq!(t.zero(0), Some(&z0));
        assert_eq!(t.zero(1), Some(&z1));
        assert_eq!(t.zero(2), Some(&z2));
        assert_eq!(t.zero(3), Some(&h(&z2, &z2)));
        assert_eq!(t.zero(4), None);
    }

    #[test]
    fn test_zero_hash_at_height_26() {
        // Empty-tree root of the on-chain commitment tree (height 26)
        let t = tree(26);
        let expected: [u8; 32] = [
            18, 12, 88, 241, 67, 212, 145, 233, 89, 2, 247, 245, 39, 119, 120, 162, 224, 173, 81,
            104, 246, 173, 215, 86, 105, 147, 38, 48, 206, 97, 21, 24,
        ];
        assert_eq!(t.zero(26).unwrap().to_be_bytes(), expected);
    }

    #[test]
    fn test_depth_two_scenario() {
        let mut t = tree(2);
        for v in 1..=3 {
            t.append(fe(v)).unwrap();
        }

        let zero = FieldElement::zero();
        let h12 = h(&fe(1), &fe(2));
        let h30 = h(&fe(3), &zero);
        let expected_root = h(&h12, &h30);

        assert_eq!(t.root().unwrap(), expected_root);

        let proof = t.proof(2).unwrap();
        assert_eq!(proof.root, expected_root);
        assert_eq!(proof.siblings, vec![zero, h12]);
        assert_eq!(proof.positions, vec![0, 1]);
    }

    #[test]
    fn test_odd_layer_pads_with_zero_not_duplicate() {
        let mut t = tree(2);
        for v in 1..=3 {
            t.append(fe(v)).unwrap();
        }

        let h12 = h(&fe(1), &fe(2));
        let duplicate_padded = h(&h12, &h(&fe(3), &fe(3)));

        assert_ne!(
            t.root().unwrap(),
            duplicate_padded,
            "odd layers must pad with zero[level], not the last node"
        );
    }

    #[test]
    fn test_single_leaf_root_climbs_zero_hashes() {
        let mut t = tree(3);
        t.append(fe(7)).unwrap();

        let l1 = h(&fe(7), t.zero(0).unwrap());
        let l2 = h(&l1, t.zero(1).unwrap());
        let l3 = h(&l2, t.zero(2).unwrap());
        assert_eq!(t.root().unwrap(), l3);
    }

    #[test]
    fn test_every_proof_replays_to_root() {
        let mut t = tree(4);
        for v in 0..11 {
            t.append(fe(100 + v)).unwrap();
        }
        let root = t.root().unwrap();

        for i in 0..t.len() {
            let proof = t.proof(i).unwrap();
            assert_eq!(proof.siblings.len(), 4);
            assert_eq!(proof.positions.len(), 4);
            assert_eq!(proof.root, root);
            assert!(
                t.verify(&proof, &fe(100 + i as u64)).unwrap(),
                "proof for leaf {i} should replay to the root"
            );
        }
        assert_eq!(
            t.proof(11).unwrap_err(),
            TreeError::IndexOutOfRange {
                index: 11,
                leaf_count: 11
            }
        );
    }

    #[test]
    fn test_root_is_deterministic() {
        let mut t = tree(3);
        t.append(fe(1)).unwrap();
        t.append(fe(2)).unwrap();
        let first = t.root().unwrap();
        t.frontier = None;
        assert_eq!(t.root().unwrap(), first);
    }

    #[test]
    fn test_incremental_root_matches_full_walk() {
        let mut t = tree(4);
        for v in 0..13 {
            let (_, root) = t.append(fe(v * 7 + 1)).unwrap();
            let walked = walk(&mut Hasher::new().unwrap(), t.leaves(), &t.zeros, None).unwrap();
            assert_eq!(root, walked.root, "incremental root diverged at leaf {v}");
        }
    }

    #[test]
    fn test_frontier_rebuilt_after_load() {
        let leaves: Vec<_> = (1..=6).map(fe).collect();
        let mut loaded = CommitmentTree::with_leaves(3, Hasher::new().unwrap(), leaves).unwrap();
        // first append walks to rebuild the frontier, the second advances it
        loaded.append(fe(7)).unwrap();
        let (_, root) = loaded.append(fe(8)).unwrap();

        let mut appended = tree(3);
        for v in 1..=8 {
            appended.append(fe(v)).unwrap();
        }
        assert_eq!(root, appended.root().unwrap());
    }

    #[test]
    fn test_append_returns_index_and_root() {
        let mut t = tree(2);
        let (i0, r0) = t.append(fe(1)).unwrap();
        let (i1, r1) = t.append(fe(2)).unwrap();
        assert_eq!((i0, i1), (0, 1));
        assert_ne!(r0, r1);
        assert_eq!(t.root().unwrap(), r1);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut t = tree(1);
        t.append(fe(1)).unwrap();
        t.append(fe(2)).unwrap();
        assert_eq!(
            t.append(fe(3)).unwrap_err(),
            TreeError::CapacityExceeded { capacity: 2 }
        );
        assert_eq!(t.len(), 2, "failed append must not change the tree");
    }

    #[test]
    fn test_full_tree_proofs() {
        let mut t = tree(2);
        for v in 1..=4 {
            t.append(fe(v)).unwrap();
        }
        for i in 0..4 {
            let proof = t.proof(i).unwrap();
            assert!(t.verify(&proof, &fe(i as u64 + 1)).unwrap());
        }
    }

    #[test]
    fn test_empty_tree_errors() {
        let mut t = tree(2);
        assert_eq!(t.root().unwrap_err(), TreeError::Empty);
        assert_eq!(t.proof_by_value(&fe(1)).unwrap_err(), TreeError::Empty);
        assert!(matches!(
            t.proof(0),
            Err(TreeError::IndexOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_proof_by_value_prefers_earliest_duplicate() {
        let mut t = tree(3);
        t.append(fe(5)).unwrap();
        t.append(fe(9)).unwrap();
        t.append(fe(5)).unwrap();

        assert_eq!(t.proof_by_value(&fe(5)).unwrap().leaf_index, 0);
        assert!(matches!(
            t.proof_by_value(&fe(6)),
            Err(TreeError::CommitmentNotFound { leaf_count: 3, .. })
        ));
    }

    #[test]
    fn test_invalid_depth() {
        assert!(matches!(
            CommitmentTree::new(0, Hasher::new().unwrap()),
            Err(TreeError::InvalidDepth { depth: 0, .. })
        ));
        assert!(matches!(
            CommitmentTree::new(33, Hasher::new().unwrap()),
            Err(TreeError::InvalidDepth { depth: 33, .. })
        ));
    }

    #[test]
    fn test_with_leaves_matches_appends() {
        let mut appended = tree(3);
        for v in 1..=5 {
            appended.append(fe(v)).unwrap();
        }
        let leaves = appended.leaves().to_vec();
        let mut loaded = CommitmentTree::with_leaves(3, Hasher::new().unwrap(), leaves).unwrap();
        assert_eq!(loaded.root().unwrap(), appended.root().unwrap());

        let too_many = (0..5).map(fe).collect();
        assert!(matches!(
            CommitmentTree::with_leaves(2, Hasher::new().unwrap(), too_many),
            Err(TreeError::CapacityExceeded { capacity: 4 })
        ));
    }

    #[test]
    fn test_tampered_proof_fails() {
        let mut t = tree(2);
        t.append(fe(1)).unwrap();
        t.append(fe(2)).unwrap();
        let mut proof = t.proof(0).unwrap();
        assert!(!t.verify(&proof, &fe(2)).unwrap());
        proof.positions[0] = 1;
        assert!(!t.verify(&proof, &fe(1)).unwrap());
    }

    #[test]
    fn test_leaf_kept_when_root_hash_fails() {
        let mut t = tree(3);
        t.append(fe(1)).unwrap();

        t.hasher_mut().fail_after(Some(0));
        assert!(matches!(t.append(fe(2)), Err(TreeError::Hash(_))));
        assert_eq!(t.leaves(), &[fe(1), fe(2)], "leaf stays appended");

        t.hasher_mut().fail_after(None);
        let mut fresh = tree(3);
        fresh.append(fe(1)).unwrap();
        fresh.append(fe(2)).unwrap();
        assert_eq!(t.root().unwrap(), fresh.root().unwrap());
        assert_eq!(t.append(fe(3)).unwrap().0, 2);
    }
}
