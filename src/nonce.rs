//! Derivation of the Format's per-message nonce prefix and per-packet nonces.

use crate::primitives::{sha512, NONCE_LEN, PUBLIC_KEY_LEN};

/// The length of the nonce prefix, in bytes.
pub const NONCE_PREFIX_LEN: usize = 16;

const PREIMAGE_PREFIX: &[u8] = b"SaltPack\0encryption nonce prefix\0";

/// The 16-byte nonce prefix, a pure function of a message's ephemeral public key.
///
/// `Nonce(i) = NoncePrefix || uint64_be(i)`. Counter `0` is reserved for the header's recipient
/// boxes; counters `2, 3, …` address successive payload packets. Counter `1` is reserved and never
/// produced by this implementation.
#[derive(Debug, Clone, Copy)]
pub struct NoncePrefix([u8; NONCE_PREFIX_LEN]);

impl NoncePrefix {
    /// Derives the nonce prefix from an ephemeral public key.
    #[must_use]
    pub fn derive(ephemeral_public: &[u8; PUBLIC_KEY_LEN]) -> NoncePrefix {
        let mut preimage = Vec::with_capacity(PREIMAGE_PREFIX.len() + PUBLIC_KEY_LEN);
        preimage.extend_from_slice(PREIMAGE_PREFIX);
        preimage.extend_from_slice(ephemeral_public);

        let digest = sha512(&preimage);
        let mut prefix = [0u8; NONCE_PREFIX_LEN];
        prefix.copy_from_slice(&digest[..NONCE_PREFIX_LEN]);
        NoncePrefix(prefix)
    }

    /// Composes this prefix with a 64-bit big-endian counter into a full 24-byte nonce.
    #[must_use]
    pub fn nonce(&self, counter: u64) -> [u8; NONCE_LEN] {
        let mut n = [0u8; NONCE_LEN];
        n[..NONCE_PREFIX_LEN].copy_from_slice(&self.0);
        n[NONCE_PREFIX_LEN..].copy_from_slice(&counter.to_be_bytes());
        n
    }
}
