//! Cryptographic primitives: SHA-256 digests, deterministic per-block IV
//! derivation, and AES-256-GCM encryption of hash blocks.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit as BlockKeyInit};
use aes::Aes256;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit as AeadKeyInit, Nonce};
use sha2::{Digest as _, Sha256};

use crate::error::DeviceError;
use crate::layout::{HASHES_PER_BLOCK, HASH_SIZE, TAG_SIZE};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AES-GCM nonce size in bytes.
pub const IV_SIZE: usize = 12;

/// A 32-byte SHA-256 digest. Used both as a leaf/node hash in the Merkle
/// tree and as the block-content hash checked on every `get`.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Digest(pub [u8; HASH_SIZE]);

impl Digest {
    /// The all-zero digest, used to seed an uninitialized tree.
    pub fn zero() -> Self {
        Digest([0u8; HASH_SIZE])
    }

    /// Lowercase hex encoding, for logging and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// SHA-256 of an arbitrary byte slice.
pub fn sha256(bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut d = [0u8; HASH_SIZE];
    d.copy_from_slice(&out);
    Digest(d)
}

/// SHA-256 of two digests concatenated, used to combine a node's children.
pub fn hash2(left: &Digest, right: &Digest) -> Digest {
    let mut buf = [0u8; 2 * HASH_SIZE];
    buf[..HASH_SIZE].copy_from_slice(&left.0);
    buf[HASH_SIZE..].copy_from_slice(&right.0);
    sha256(&buf)
}

/// Derive the deterministic 12-byte AES-GCM nonce for hash block `index`
/// under `key`.
///
/// The nonce is never persisted: it is recomputed on every encrypt and
/// decrypt from `SHA256(key)` run through a single AES-256-ECB block
/// whose plaintext is `index` as a little-endian `u64` zero-padded to 16
/// bytes, truncated to the first 12 bytes. Because the nonce depends on
/// both the key and the hash block index, and each hash block index is
/// used for exactly one nonce derivation per key, this does not reuse a
/// nonce under a fixed key.
fn derive_iv(key: &[u8; KEY_SIZE], hash_block_index: u64) -> [u8; IV_SIZE] {
    let khash = sha256(key);
    let cipher = Aes256::new_from_slice(&khash.0).expect("sha256 output is always 32 bytes");

    let mut input = [0u8; 16];
    input[..8].copy_from_slice(&hash_block_index.to_le_bytes());
    let mut block = GenericArray::clone_from_slice(&input);
    cipher.encrypt_block(&mut block);

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&block[..IV_SIZE]);
    iv
}

/// Encrypt the `HASHES_PER_BLOCK * 32`-byte plaintext of hash block
/// `hash_block_index`, returning the ciphertext (same length as the
/// plaintext) and its 16-byte authentication tag separately.
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    hash_block_index: u64,
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_SIZE]), DeviceError> {
    debug_assert_eq!(plaintext.len(), HASHES_PER_BLOCK * HASH_SIZE);

    let gcm_key = aes_gcm::Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(gcm_key);
    let iv = derive_iv(key, hash_block_index);
    let nonce = Nonce::from_slice(&iv);

    let mut combined =
        cipher.encrypt(nonce, plaintext).map_err(|_| DeviceError::CryptoFailure)?;

    let tag_start = combined.len().saturating_sub(TAG_SIZE);
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&combined[tag_start..]);
    combined.truncate(tag_start);

    Ok((combined, tag))
}

/// Decrypt and authenticate the ciphertext and tag of hash block
/// `hash_block_index`. Returns `CorruptOrTampered` if authentication
/// fails, which covers both bit-level corruption and deliberate
/// tampering — the caller cannot distinguish the two.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    hash_block_index: u64,
    tag: &[u8; TAG_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DeviceError> {
    debug_assert_eq!(ciphertext.len(), HASHES_PER_BLOCK * HASH_SIZE);

    let gcm_key = aes_gcm::Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(gcm_key);
    let iv = derive_iv(key, hash_block_index);
    let nonce = Nonce::from_slice(&iv);

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher.decrypt(nonce, combined.as_slice()).map_err(|_| DeviceError::CorruptOrTampered)
}
