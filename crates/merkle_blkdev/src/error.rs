//! Error types returned by the merkle block device layer.

use thiserror::Error;

/// Errors returned by [`crate::DeviceHandle`] and the lower block-device
/// contract it is stacked on top of.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Bad parameters: non-power-of-two `nblks`, out-of-range `blkno`, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The underlying (lower) block device reported an error.
    #[error("lower device error: {0}")]
    LowerDevice(String),

    /// The persisted header block failed its magic-number (or `nblks`)
    /// check on load.
    #[error("corrupt header")]
    CorruptHeader,

    /// AES-GCM authentication failed while decrypting a persisted hash
    /// block.
    #[error("hash block corrupt or tampered")]
    CorruptOrTampered,

    /// A leaf hash did not match the block read back from the lower
    /// device.
    #[error("tamper detected")]
    TamperDetected,

    /// The recomputed Merkle root did not match the persisted header
    /// root at load time.
    #[error("root mismatch")]
    RootMismatch,

    /// A buffer allocation failed. Unreachable under Rust's default,
    /// abort-on-OOM allocator; kept for interface parity with the
    /// original error surface this layer is modeled on.
    #[error("allocation failure")]
    AllocFailure,

    /// The SHA-256/AES-GCM primitive reported an internal failure (e.g.
    /// a key of the wrong length was supplied).
    #[error("crypto primitive failure")]
    CryptoFailure,
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::LowerDevice(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_never_echo_key_material() {
        // A defensive smoke test: none of the Display impls take a key or
        // digest as an argument, so nothing to redact — but assert the
        // shape stays that way for the variants most likely to grow one.
        let msgs = [
            DeviceError::CorruptOrTampered.to_string(),
            DeviceError::TamperDetected.to_string(),
            DeviceError::RootMismatch.to_string(),
        ];
        for m in msgs {
            assert!(!m.is_empty());
        }
    }
}
