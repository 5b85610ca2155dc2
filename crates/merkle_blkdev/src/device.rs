//! The block-device façade: the public, stackable capability surface
//! between upstream callers and the lower device, keeping the Merkle
//! tree authenticated and consistent across `get`/`put`/`begin`/`end`.

use std::sync::{Arc, Mutex};

use tracing::instrument;

use crate::capacity::num_hash_blocks;
use crate::crypto::{self, Digest, KEY_SIZE};
use crate::error::DeviceError;
use crate::layout::{zero_block, Block, HashBlock, HeaderBlock, MAGIC};
use crate::tree::TreeState;

/// The stackable block-device capability set this layer both consumes
/// (from the lower device) and exposes (to upstream callers).
///
/// `add_ref`/`release` are not part of this trait: they are modeled
/// through ordinary `Clone`/`Drop` on [`DeviceHandle`] instead (see its
/// documentation).
pub trait BlockDevice: Send + Sync {
    /// Read block `blkno` into `out`. `blkno` must be within range.
    fn get(&self, blkno: u64, out: &mut Block) -> Result<(), DeviceError>;
    /// Write `data` to block `blkno`. `blkno` must be within range.
    fn put(&self, blkno: u64, data: &Block) -> Result<(), DeviceError>;
    /// Begin a transaction on the underlying device, if it supports one.
    /// A no-op is a valid implementation.
    fn begin(&self) -> Result<(), DeviceError>;
    /// End a transaction on the underlying device, if it supports one.
    /// A no-op is a valid implementation.
    fn end(&self) -> Result<(), DeviceError>;
}

struct State {
    header: HeaderBlock,
    tree: TreeState,
}

fn flush_merkle(
    key: &[u8; KEY_SIZE],
    state: &mut State,
    lower: &dyn BlockDevice,
) -> Result<(), DeviceError> {
    if !state.tree.any_dirty() {
        return Ok(());
    }

    state.header.root = state.tree.root();
    lower.put(state.header.nblks, &state.header.encode())?;

    let base = state.header.nblks + 1;
    for i in 0..state.tree.num_hash_blocks() {
        if !state.tree.is_dirty(i) {
            continue;
        }
        let plaintext = state.tree.hash_block(i).plaintext();
        let (ciphertext, tag) = crypto::encrypt(key, i as u64, &plaintext)?;
        let image = HashBlock::encode(&tag, &ciphertext);
        lower.put(base + i as u64, &image)?;
        state.tree.clear_dirty(i);
    }

    state.tree.clear_any_dirty();
    Ok(())
}

fn load_state(key: &[u8; KEY_SIZE], nblks: u64, lower: &dyn BlockDevice) -> Result<State, DeviceError> {
    let mut header_blk = zero_block();
    lower.get(nblks, &mut header_blk)?;
    let header = HeaderBlock::decode(&header_blk)?;
    if header.nblks != nblks {
        return Err(DeviceError::CorruptHeader);
    }

    let count = num_hash_blocks(nblks);
    let base = nblks + 1;
    let mut hash_blocks = Vec::with_capacity(count);
    for i in 0..count {
        let mut blk = zero_block();
        lower.get(base + i as u64, &mut blk)?;
        let (tag, ciphertext) = HashBlock::split(&blk);
        let plaintext = crypto::decrypt(key, i as u64, &tag, ciphertext)?;
        hash_blocks.push(HashBlock::from_plaintext(&plaintext));
    }

    let mut tree = TreeState::from_hash_blocks(nblks, hash_blocks);
    tree.recompute_upper();
    if tree.root() != header.root {
        return Err(DeviceError::RootMismatch);
    }

    Ok(State { header, tree })
}

struct MerkleBlockDeviceInner {
    key: [u8; KEY_SIZE],
    lower: Arc<dyn BlockDevice>,
    state: Mutex<State>,
}

impl Drop for MerkleBlockDeviceInner {
    fn drop(&mut self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = flush_merkle(&self.key, &mut state, self.lower.as_ref()) {
            tracing::error!(
                error = %err,
                "final flush on drop failed; device closed without committing dirty hash blocks"
            );
        }
    }
}

/// A reference-counted handle to an open merkle block device.
///
/// `Clone` is the Rust equivalent of `add_ref`: it bumps the underlying
/// `Arc`'s strong count rather than allocating new state. Dropping the
/// last handle performs a best-effort `release` — a final flush of any
/// dirty hash blocks and the header — logging (rather than propagating)
/// a failure, since `Drop` cannot return a `Result`. Call
/// [`DeviceHandle::release`] directly when that outcome must be
/// observed.
#[derive(Clone)]
pub struct DeviceHandle(Arc<MerkleBlockDeviceInner>);

impl DeviceHandle {
    /// Open a merkle-authenticated, encrypted block device stacked on
    /// `lower`.
    ///
    /// When `initialize` is `true`, builds a fresh all-zero-leaf tree
    /// for `nblks` data blocks and flushes it immediately. Otherwise,
    /// loads and authenticates a previously initialized device; `nblks`
    /// must match the value it was initialized with, and the lower
    /// device must already have at least `nblks + extra_blocks(nblks)`
    /// blocks.
    ///
    /// `nblks` must be a power of two strictly greater than 1.
    #[instrument(skip(lower, key), fields(nblks, initialize))]
    pub fn open(
        lower: Arc<dyn BlockDevice>,
        initialize: bool,
        nblks: u64,
        key: [u8; KEY_SIZE],
    ) -> Result<Self, DeviceError> {
        if nblks <= 1 || !nblks.is_power_of_two() {
            return Err(DeviceError::InvalidArgument(
                "nblks must be a power of two greater than 1",
            ));
        }

        let state = if initialize {
            let tree = TreeState::new_zero(nblks);
            let header = HeaderBlock { magic: MAGIC, nblks, root: tree.root() };
            State { header, tree }
        } else {
            load_state(&key, nblks, lower.as_ref())?
        };

        let inner = Arc::new(MerkleBlockDeviceInner { key, lower, state: Mutex::new(state) });

        if initialize {
            let mut guard = inner.state.lock().unwrap();
            flush_merkle(&inner.key, &mut guard, inner.lower.as_ref())?;
            drop(guard);
            tracing::info!("merkle block device initialized");
        } else {
            tracing::info!("merkle block device loaded and authenticated");
        }

        Ok(Self(inner))
    }

    /// Increment the reference count. Equivalent to `Clone::clone`,
    /// spelled out for callers translating from the `add_ref` idiom.
    #[must_use]
    pub fn add_ref(&self) -> Self {
        self.clone()
    }

    /// Decrement the reference count. If this was the last handle,
    /// flushes any dirty hash blocks and the header, surfacing the
    /// flush's result instead of only logging it on failure.
    pub fn release(self) -> Result<(), DeviceError> {
        if Arc::strong_count(&self.0) == 1 {
            let mut guard = self.0.state.lock().unwrap();
            let result = flush_merkle(&self.0.key, &mut guard, self.0.lower.as_ref());
            drop(guard);
            result
        } else {
            Ok(())
        }
    }

    /// The number of data blocks this device exposes.
    pub fn nblks(&self) -> u64 {
        self.0.state.lock().unwrap().header.nblks
    }

    /// The device's current Merkle root. Exposed for diagnostics and
    /// tests; not required for normal `get`/`put` use.
    pub fn root(&self) -> Digest {
        self.0.state.lock().unwrap().tree.root()
    }
}

impl BlockDevice for DeviceHandle {
    #[instrument(skip(self, out), fields(blkno))]
    fn get(&self, blkno: u64, out: &mut Block) -> Result<(), DeviceError> {
        let nblks = self.0.state.lock().unwrap().header.nblks;
        if blkno >= nblks {
            return Err(DeviceError::InvalidArgument("blkno out of range"));
        }

        self.0.lower.get(blkno, out)?;
        let computed = crypto::sha256(out);

        let state = self.0.state.lock().unwrap();
        let expected = state.tree.leaf(blkno);
        drop(state);

        if expected != computed {
            *out = zero_block();
            tracing::warn!(blkno, "tamper detected on read: leaf hash mismatch");
            return Err(DeviceError::TamperDetected);
        }

        Ok(())
    }

    #[instrument(skip(self, data), fields(blkno))]
    fn put(&self, blkno: u64, data: &Block) -> Result<(), DeviceError> {
        let mut state = self.0.state.lock().unwrap();
        if blkno >= state.header.nblks {
            return Err(DeviceError::InvalidArgument("blkno out of range"));
        }

        let digest = crypto::sha256(data);
        state.tree.update(blkno, digest);
        state.header.root = state.tree.root();
        drop(state);

        self.0.lower.put(blkno, data)
    }

    #[instrument(skip(self))]
    fn begin(&self) -> Result<(), DeviceError> {
        self.0.lower.begin()
    }

    #[instrument(skip(self))]
    fn end(&self) -> Result<(), DeviceError> {
        {
            let mut state = self.0.state.lock().unwrap();
            flush_merkle(&self.0.key, &mut state, self.0.lower.as_ref())?;
        }
        self.0.lower.end()
    }
}
