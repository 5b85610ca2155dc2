//! A Merkle-authenticated, encrypted block device layer.
//!
//! This crate stacks on top of a lower [`BlockDevice`] and adds two
//! properties it does not itself provide: confidentiality of the
//! persisted Merkle hash tree (AES-256-GCM), and tamper-evidence of
//! every data block (a binary Merkle tree rooted in an authenticated
//! header block).
//!
//! # Layout
//!
//! The tree is split in memory: non-leaf digests live in a packed
//! array, while leaves live embedded in the same hash-block groups that
//! get encrypted and persisted after the header:
//!
//! ```text
//! [ data blocks 0 .. nblks )  [ header @ nblks ]  [ hash blocks @ nblks+1 .. )
//! ```
//!
//! `get` verifies a block's leaf hash before returning it; `put` updates
//! the tree in memory; `end` (or the final `release`/`Drop`) flushes
//! dirty hash blocks and the header, persisting the tree's new
//! authenticated state.
//!
//! # Security model
//!
//! AES-256-GCM provides confidentiality and integrity for hash blocks
//! at rest. Data blocks themselves are not encrypted by this layer —
//! only authenticated, via the Merkle tree — encryption of data block
//! contents is a different layer's concern. The nonce for each hash
//! block is derived deterministically from `(key, hash block index)`
//! and is never persisted; it is never reused across distinct
//! `(key, index)` pairs.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use merkle_blkdev::{extra_blocks, BlockDevice, DeviceHandle, MemBlockDevice, BLOCK_SIZE};
//!
//! let nblks = 8u64;
//! let lower = Arc::new(MemBlockDevice::new(nblks + extra_blocks(nblks)));
//!
//! let dev = DeviceHandle::open(lower, true, nblks, [0x11; 32]).unwrap();
//!
//! let mut payload = [0u8; BLOCK_SIZE];
//! payload[0] = 0x42;
//! dev.put(3, &payload).unwrap();
//! dev.end().unwrap();
//!
//! let mut out = [0u8; BLOCK_SIZE];
//! dev.get(3, &mut out).unwrap();
//! assert_eq!(out, payload);
//! ```

#![warn(missing_docs)]

mod capacity;
mod crypto;
mod device;
mod error;
mod layout;
mod lower;
#[cfg(feature = "logging-init")]
pub mod logging;
mod tree;

pub use capacity::extra_blocks;
pub use crypto::Digest;
pub use device::{BlockDevice, DeviceHandle};
pub use error::DeviceError;
pub use layout::{Block, BLOCK_SIZE, HASHES_PER_BLOCK, MAGIC};
pub use lower::MemBlockDevice;
