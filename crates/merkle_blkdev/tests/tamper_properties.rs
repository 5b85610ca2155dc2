#![allow(missing_docs)]

// Property: for any byte offset and any non-zero bit mask, flipping that
// bit in a persisted data block is caught on the next `get` — regardless
// of which data block, or what was written to it, the corruption lands
// in.

use std::sync::Arc;

use merkle_blkdev::{extra_blocks, BlockDevice, DeviceError, DeviceHandle, MemBlockDevice, BLOCK_SIZE};
use proptest::prelude::*;

const NBLKS: u64 = 8;

fn open_fresh() -> (DeviceHandle, Arc<MemBlockDevice>) {
    let lower = Arc::new(MemBlockDevice::new(NBLKS + extra_blocks(NBLKS)));
    let dev = DeviceHandle::open(lower.clone(), true, NBLKS, [0x5Eu8; 32]).unwrap();
    (dev, lower)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn any_single_bit_flip_in_a_data_block_is_detected(
        blkno in 0u64..NBLKS,
        payload in proptest::collection::vec(any::<u8>(), BLOCK_SIZE..=BLOCK_SIZE),
        offset in 0usize..BLOCK_SIZE,
        bit in 1u8..=255u8,
    ) {
        let (dev, lower) = open_fresh();
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&payload);
        dev.put(blkno, &data).unwrap();
        dev.end().unwrap();

        let mut tampered = lower.raw_read(blkno);
        tampered[offset] ^= bit;
        lower.raw_write(blkno, tampered);

        let mut out = [0u8; BLOCK_SIZE];
        let err = dev.get(blkno, &mut out).unwrap_err();
        prop_assert!(matches!(err, DeviceError::TamperDetected));
        prop_assert_eq!(out, [0u8; BLOCK_SIZE]);
    }
}
