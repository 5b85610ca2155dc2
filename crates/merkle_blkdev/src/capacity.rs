//! Capacity planning: how many overhead blocks (header + hash blocks)
//! this layer needs on top of the `nblks` data blocks it exposes.

use crate::layout::HASHES_PER_BLOCK;

/// Number of hash blocks needed to index `nblks` leaves.
pub(crate) fn num_hash_blocks(nblks: u64) -> usize {
    (nblks as usize).div_ceil(HASHES_PER_BLOCK)
}

/// Number of extra blocks a caller must reserve on the lower device on
/// top of `nblks` data blocks: one header block plus the hash blocks
/// needed to cover all `nblks` leaves.
///
/// This does not itself require `nblks` to be a power of two — that
/// discipline belongs to [`crate::DeviceHandle::open`], which callers
/// typically consult alongside this helper when sizing a new device.
pub fn extra_blocks(nblks: u64) -> u64 {
    1 + num_hash_blocks(nblks) as u64
}
