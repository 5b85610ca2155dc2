//! In-memory Merkle tree store and the algorithms that keep it
//! consistent across initialization, loading, and per-block updates.
//!
//! The tree is a complete binary tree over `nblks` leaves, one per data
//! block. Its `upper_size = nblks - 1` non-leaf nodes are kept as a
//! flat, plaintext array (`upper`); its leaves live embedded inside the
//! same [`HashBlock`] groups that get encrypted and persisted. A node
//! index `k` therefore resolves to either `upper[k]` or a leaf lookup,
//! depending only on whether `k < upper_size`.

use crate::crypto::{hash2, sha256, Digest};
use crate::layout::{zero_block, HashBlock, HASHES_PER_BLOCK};

fn left_child(n: usize) -> usize {
    2 * n + 1
}

fn right_child(n: usize) -> usize {
    2 * n + 2
}

fn parent(n: usize) -> Option<usize> {
    if n == 0 {
        None
    } else {
        Some((n - 1) / 2)
    }
}

/// The split in-memory Merkle tree representation described above.
pub(crate) struct TreeState {
    upper_size: usize,
    upper: Vec<Digest>,
    hash_blocks: Vec<HashBlock>,
    dirty: Vec<bool>,
    any_dirty: bool,
}

impl TreeState {
    /// Number of hash blocks backing this tree's leaves.
    pub fn num_hash_blocks(&self) -> usize {
        self.hash_blocks.len()
    }

    /// Borrow hash block `i` (its current, possibly-dirty contents).
    pub fn hash_block(&self, i: usize) -> &HashBlock {
        &self.hash_blocks[i]
    }

    /// Whether hash block `i` has unflushed changes.
    pub fn is_dirty(&self, i: usize) -> bool {
        self.dirty[i]
    }

    /// Mark hash block `i` as flushed.
    pub fn clear_dirty(&mut self, i: usize) {
        self.dirty[i] = false;
    }

    /// Whether any hash block (or the header root) has unflushed changes.
    pub fn any_dirty(&self) -> bool {
        self.any_dirty
    }

    /// Clear the aggregate dirty flag once every dirty hash block has
    /// been flushed.
    pub fn clear_any_dirty(&mut self) {
        self.any_dirty = false;
    }

    /// The current Merkle root (`upper[0]`).
    pub fn root(&self) -> Digest {
        self.upper[0]
    }

    /// The leaf digest recorded for data block `blkno`.
    pub fn leaf(&self, blkno: u64) -> Digest {
        let blkno = blkno as usize;
        let (block, slot) = (blkno / HASHES_PER_BLOCK, blkno % HASHES_PER_BLOCK);
        self.hash_blocks[block].hashes[slot]
    }

    fn set_leaf(&mut self, blkno: usize, digest: Digest) {
        let (block, slot) = (blkno / HASHES_PER_BLOCK, blkno % HASHES_PER_BLOCK);
        self.hash_blocks[block].hashes[slot] = digest;
        self.dirty[block] = true;
        self.any_dirty = true;
    }

    /// Resolve node `k`'s digest, whether it lives in `upper` or is a
    /// leaf embedded in a hash block.
    fn child_hash(&self, k: usize) -> Digest {
        if k < self.upper_size {
            self.upper[k]
        } else {
            self.leaf((k - self.upper_size) as u64)
        }
    }

    /// Build the all-zero-leaf tree for a freshly initialized device.
    /// Every hash block starts dirty so the first flush writes them all.
    pub fn new_zero(nblks: u64) -> Self {
        let nblks = nblks as usize;
        let upper_size = nblks - 1;
        let num_hash_blocks = nblks.div_ceil(HASHES_PER_BLOCK);
        let zero_leaf = sha256(&zero_block());

        let mut tree = Self {
            upper_size,
            upper: vec![Digest::zero(); upper_size],
            hash_blocks: (0..num_hash_blocks).map(|_| HashBlock::filled(zero_leaf)).collect(),
            dirty: vec![true; num_hash_blocks],
            any_dirty: true,
        };
        tree.recompute_upper();
        tree
    }

    /// Wrap already-decrypted hash blocks (read back while loading a
    /// device) in a fresh, clean `upper` array. Call
    /// [`TreeState::recompute_upper`] before trusting `root()`.
    pub fn from_hash_blocks(nblks: u64, hash_blocks: Vec<HashBlock>) -> Self {
        let upper_size = nblks as usize - 1;
        let num_hash_blocks = hash_blocks.len();
        Self {
            upper_size,
            upper: vec![Digest::zero(); upper_size],
            hash_blocks,
            dirty: vec![false; num_hash_blocks],
            any_dirty: false,
        }
    }

    /// Recompute every non-leaf digest bottom-up from the current
    /// leaves. `O(nblks)`; used once at load time (and once at
    /// initialization) rather than on every write.
    pub fn recompute_upper(&mut self) {
        for index in (0..self.upper_size).rev() {
            let left = self.child_hash(left_child(index));
            let right = self.child_hash(right_child(index));
            self.upper[index] = hash2(&left, &right);
        }
    }

    /// Record a new leaf digest for `blkno` and walk the path to the
    /// root, recomputing and writing back every ancestor's digest.
    ///
    /// Each step here both computes a parent's new hash AND stores it
    /// into `upper[parent]` before continuing upward — skipping the
    /// write-back would leave stale ancestor digests in the tree even
    /// though the walk still reaches the correct root value on its own
    /// final step; callers that read an ancestor (rather than only the
    /// root) in between writes require every level to be written back
    /// immediately.
    pub fn update(&mut self, blkno: u64, digest: Digest) {
        self.set_leaf(blkno as usize, digest);

        let mut node = self.upper_size + blkno as usize;
        while let Some(p) = parent(node) {
            let left = self.child_hash(left_child(p));
            let right = self.child_hash(right_child(p));
            self.upper[p] = hash2(&left, &right);
            node = p;
        }
    }
}
