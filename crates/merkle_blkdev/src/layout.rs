//! On-disk layout: block size constants and the codecs for the header
//! block and hash blocks.
//!
//! Physical layout of the lower device, in block numbers:
//!
//! ```text
//! [ data blocks 0 .. nblks )  [ header @ nblks ]  [ hash blocks @ nblks+1 .. )
//! ```

use crate::crypto::Digest;
use crate::error::DeviceError;

/// Size of every block on the lower device, in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// Size of a single digest, in bytes.
pub const HASH_SIZE: usize = 32;
/// Number of leaf digests packed into a single hash block. Derived from
/// `BLOCK_SIZE`: a 16-byte AEAD tag and 16 bytes of padding are reserved
/// ahead of the encrypted digest region.
pub const HASHES_PER_BLOCK: usize = (BLOCK_SIZE / HASH_SIZE) - 1;
/// Magic number stamped into every header block.
pub const MAGIC: u64 = 0xEA6A_86F9_9E6A_4F83;
/// Size of the AES-GCM authentication tag, in bytes.
pub(crate) const TAG_SIZE: usize = 16;
/// Reserved padding between the tag and the encrypted hash region.
const PADDING_SIZE: usize = 16;

/// A single raw block as exchanged with the lower device.
pub type Block = [u8; BLOCK_SIZE];

/// A block of zero bytes.
pub fn zero_block() -> Block {
    [0u8; BLOCK_SIZE]
}

/// The single plaintext header block persisted at block number `nblks`:
/// a magic number, the device's block count, and the current Merkle
/// root.
#[derive(Clone, Debug)]
pub(crate) struct HeaderBlock {
    pub magic: u64,
    pub nblks: u64,
    pub root: Digest,
}

impl HeaderBlock {
    pub fn encode(&self) -> Block {
        let mut out = zero_block();
        out[0..8].copy_from_slice(&self.magic.to_le_bytes());
        out[8..16].copy_from_slice(&self.nblks.to_le_bytes());
        out[16..16 + HASH_SIZE].copy_from_slice(&self.root.0);
        out
    }

    pub fn decode(block: &Block) -> Result<Self, DeviceError> {
        let magic = u64::from_le_bytes(block[0..8].try_into().unwrap());
        if magic != MAGIC {
            return Err(DeviceError::CorruptHeader);
        }
        let nblks = u64::from_le_bytes(block[8..16].try_into().unwrap());
        let mut root = [0u8; HASH_SIZE];
        root.copy_from_slice(&block[16..16 + HASH_SIZE]);
        Ok(Self { magic, nblks, root: Digest(root) })
    }
}

/// The decrypted contents of one hash block: a contiguous run of
/// `HASHES_PER_BLOCK` leaf digests.
#[derive(Clone)]
pub(crate) struct HashBlock {
    pub hashes: [Digest; HASHES_PER_BLOCK],
}

impl HashBlock {
    /// A hash block whose every leaf is `leaf`.
    pub fn filled(leaf: Digest) -> Self {
        Self { hashes: [leaf; HASHES_PER_BLOCK] }
    }

    /// Concatenate the leaf digests into the plaintext fed to AES-GCM.
    pub fn plaintext(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HASHES_PER_BLOCK * HASH_SIZE);
        for h in &self.hashes {
            out.extend_from_slice(&h.0);
        }
        out
    }

    /// Reconstruct a hash block from a decrypted plaintext buffer.
    pub fn from_plaintext(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), HASHES_PER_BLOCK * HASH_SIZE);
        let mut hashes = [Digest::zero(); HASHES_PER_BLOCK];
        for (slot, chunk) in hashes.iter_mut().zip(bytes.chunks_exact(HASH_SIZE)) {
            let mut raw = [0u8; HASH_SIZE];
            raw.copy_from_slice(chunk);
            *slot = Digest(raw);
        }
        Self { hashes }
    }

    /// Assemble the on-disk block image from a tag and ciphertext.
    pub fn encode(tag: &[u8; TAG_SIZE], ciphertext: &[u8]) -> Block {
        debug_assert_eq!(ciphertext.len(), HASHES_PER_BLOCK * HASH_SIZE);
        let mut out = zero_block();
        out[0..TAG_SIZE].copy_from_slice(tag);
        out[TAG_SIZE + PADDING_SIZE..].copy_from_slice(ciphertext);
        out
    }

    /// Split a persisted block image back into its tag and ciphertext.
    pub fn split(block: &Block) -> ([u8; TAG_SIZE], &[u8]) {
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&block[0..TAG_SIZE]);
        let ciphertext = &block[TAG_SIZE + PADDING_SIZE..];
        (tag, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = HeaderBlock { magic: MAGIC, nblks: 128, root: Digest([7u8; HASH_SIZE]) };
        let decoded = HeaderBlock::decode(&header.encode()).unwrap();
        assert_eq!(decoded.nblks, 128);
        assert_eq!(decoded.root, header.root);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut block = zero_block();
        block[0..8].copy_from_slice(&0xDEAD_BEEFu64.to_le_bytes());
        assert!(matches!(HeaderBlock::decode(&block), Err(DeviceError::CorruptHeader)));
    }

    #[test]
    fn hash_block_plaintext_round_trips() {
        let hb = HashBlock::filled(Digest([9u8; HASH_SIZE]));
        let plaintext = hb.plaintext();
        assert_eq!(plaintext.len(), HASHES_PER_BLOCK * HASH_SIZE);
        let decoded = HashBlock::from_plaintext(&plaintext);
        assert_eq!(decoded.hashes[0], hb.hashes[0]);
        assert_eq!(decoded.hashes[HASHES_PER_BLOCK - 1], hb.hashes[HASHES_PER_BLOCK - 1]);
    }

    #[test]
    fn hash_block_image_exactly_fills_a_block() {
        let tag = [1u8; TAG_SIZE];
        let ciphertext = vec![2u8; HASHES_PER_BLOCK * HASH_SIZE];
        let image = HashBlock::encode(&tag, &ciphertext);
        assert_eq!(image.len(), BLOCK_SIZE);
        let (split_tag, split_ct) = HashBlock::split(&image);
        assert_eq!(split_tag, tag);
        assert_eq!(split_ct, ciphertext.as_slice());
    }
}
