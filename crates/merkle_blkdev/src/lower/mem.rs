//! An in-memory `BlockDevice`, standing in for a disk in tests and
//! examples.

use std::sync::Mutex;

use crate::device::BlockDevice;
use crate::error::DeviceError;
use crate::layout::{zero_block, Block};

/// A `BlockDevice` backed entirely by memory. `begin`/`end` never fail
/// (there is no transactional boundary to honor); `get`/`put` fail only
/// on an out-of-range `blkno`.
pub struct MemBlockDevice {
    blocks: Mutex<Vec<Block>>,
}

impl MemBlockDevice {
    /// Create a device with `total_blocks` zero-initialized blocks.
    pub fn new(total_blocks: u64) -> Self {
        Self { blocks: Mutex::new(vec![zero_block(); total_blocks as usize]) }
    }

    /// Read the raw bytes of `blkno`, bypassing the merkle layer
    /// entirely. Used by tests to inspect persisted state.
    pub fn raw_read(&self, blkno: u64) -> Block {
        self.blocks.lock().unwrap()[blkno as usize]
    }

    /// Overwrite the raw bytes of `blkno`, bypassing the merkle layer
    /// entirely. Used by tests to simulate tampering or bit rot.
    pub fn raw_write(&self, blkno: u64, block: Block) {
        self.blocks.lock().unwrap()[blkno as usize] = block;
    }
}

impl BlockDevice for MemBlockDevice {
    fn get(&self, blkno: u64, out: &mut Block) -> Result<(), DeviceError> {
        let blocks = self.blocks.lock().unwrap();
        let blk = blocks
            .get(blkno as usize)
            .ok_or(DeviceError::InvalidArgument("blkno out of range"))?;
        *out = *blk;
        Ok(())
    }

    fn put(&self, blkno: u64, data: &Block) -> Result<(), DeviceError> {
        let mut blocks = self.blocks.lock().unwrap();
        let blk = blocks
            .get_mut(blkno as usize)
            .ok_or(DeviceError::InvalidArgument("blkno out of range"))?;
        *blk = *data;
        Ok(())
    }

    fn begin(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn end(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_block() {
        let dev = MemBlockDevice::new(4);
        let mut blk = zero_block();
        blk[0] = 0xAB;
        dev.put(1, &blk).unwrap();
        let mut out = zero_block();
        dev.get(1, &mut out).unwrap();
        assert_eq!(out, blk);
    }

    #[test]
    fn rejects_out_of_range_blkno() {
        let dev = MemBlockDevice::new(2);
        let mut out = zero_block();
        assert!(dev.get(5, &mut out).is_err());
    }

    #[test]
    fn raw_read_and_write_bypass_any_checking() {
        let dev = MemBlockDevice::new(2);
        let mut blk = zero_block();
        blk[0] = 1;
        dev.raw_write(0, blk);
        assert_eq!(dev.raw_read(0), blk);
    }
}
