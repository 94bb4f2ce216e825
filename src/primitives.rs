//! Cryptographic primitives consumed by the rest of the crate: X25519 key agreement, authenticated
//! public-key boxes and symmetric secretboxes (both XSalsa20-Poly1305), SHA-512, and a thin CSPRNG
//! wrapper.
//!
//! Nothing here is Format-specific; [`crate::header`] and [`crate::mres`] build the Format's
//! framing and nonce discipline on top of these.

use crypto_box::aead::Aead;
use crypto_box::{PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use xsalsa20poly1305::{KeyInit, Nonce, XSalsa20Poly1305};

/// The length of a public or private X25519 key, in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// The length of an X25519 private scalar, in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// The length of the per-message symmetric encryption key, in bytes.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// The length of a Poly1305 authentication tag, in bytes.
pub const TAG_LEN: usize = 16;

/// The length of an XSalsa20 nonce, in bytes.
pub const NONCE_LEN: usize = 24;

/// Returned when an authenticated open operation fails to verify. Carries no information beyond
/// "this did not open", by design: a timing- or error-message-dependent oracle would undermine the
/// authenticator.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationFailed;

/// Derives the public key corresponding to a private scalar via X25519 base-point multiplication.
#[must_use]
pub fn scalar_base_mult(sk: &[u8; PRIVATE_KEY_LEN]) -> [u8; PUBLIC_KEY_LEN] {
    *BoxSecretKey::from(*sk).public_key().as_bytes()
}

/// Fills an `N`-byte array with output from a cryptographically secure RNG.
///
/// Uses `try_fill_bytes` rather than the infallible `fill_bytes` so that a CSPRNG failure (e.g. the
/// OS entropy source being unavailable) surfaces as an error instead of a panic.
pub fn random_bytes<const N: usize>(rng: &mut (impl RngCore + CryptoRng)) -> Result<[u8; N], rand::Error> {
    let mut buf = [0u8; N];
    rng.try_fill_bytes(&mut buf)?;
    Ok(buf)
}

/// Computes the SHA-512 digest of `data`.
#[must_use]
pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

/// An authenticated public-key box keyed by a precomputed X25519 shared secret (`beforenm`).
///
/// A single [`PrecomputedBox`] is reused across many [`seal`](PrecomputedBox::seal)/
/// [`open`](PrecomputedBox::open) calls with distinct nonces (`afternm`), skipping the
/// Diffie-Hellman step on each call.
pub struct PrecomputedBox(SalsaBox);

impl PrecomputedBox {
    /// Precomputes the shared secret between `their_public` and `our_private`.
    #[must_use]
    pub fn new(their_public: &[u8; PUBLIC_KEY_LEN], our_private: &[u8; PRIVATE_KEY_LEN]) -> PrecomputedBox {
        PrecomputedBox(SalsaBox::new(&BoxPublicKey::from(*their_public), &BoxSecretKey::from(*our_private)))
    }

    /// Seals `msg` under the given 24-byte nonce.
    #[must_use]
    pub fn seal(&self, nonce: &[u8; NONCE_LEN], msg: &[u8]) -> Vec<u8> {
        self.0.encrypt(Nonce::from_slice(nonce), msg).expect("box encryption does not fail")
    }

    /// Opens `ct`, sealed under the given 24-byte nonce, or fails if the authenticator is invalid.
    pub fn open(&self, nonce: &[u8; NONCE_LEN], ct: &[u8]) -> Result<Vec<u8>, AuthenticationFailed> {
        self.0.decrypt(Nonce::from_slice(nonce), ct).map_err(|_| AuthenticationFailed)
    }
}

/// Seals `msg` for `their_public` using `our_private`, without retaining the precomputed shared
/// secret for reuse. Used exactly once per recipient, for the header's wrapped-key boxes.
#[must_use]
pub fn box_seal(
    msg: &[u8],
    nonce: &[u8; NONCE_LEN],
    their_public: &[u8; PUBLIC_KEY_LEN],
    our_private: &[u8; PRIVATE_KEY_LEN],
) -> Vec<u8> {
    PrecomputedBox::new(their_public, our_private).seal(nonce, msg)
}

/// Opens `ct`, the inverse of [`box_seal`].
pub fn box_open(
    ct: &[u8],
    nonce: &[u8; NONCE_LEN],
    their_public: &[u8; PUBLIC_KEY_LEN],
    our_private: &[u8; PRIVATE_KEY_LEN],
) -> Result<Vec<u8>, AuthenticationFailed> {
    PrecomputedBox::new(their_public, our_private).open(nonce, ct)
}

/// Seals `msg` under `key` using XSalsa20-Poly1305, returning the 16-byte Poly1305 tag as a
/// *prefix* to the ciphertext body.
///
/// This matches the wire layout in the Format's data model (the tag is split off the front of the
/// symmetric ciphertext and wrapped separately per recipient), not the trailing-tag convention used
/// by the underlying AEAD crate, so the bytes are reordered here.
#[must_use]
pub fn secretbox_seal(msg: &[u8], nonce: &[u8; NONCE_LEN], key: &[u8; SYMMETRIC_KEY_LEN]) -> Vec<u8> {
    let cipher = XSalsa20Poly1305::new(key.into());
    let sealed = cipher.encrypt(Nonce::from_slice(nonce), msg).expect("secretbox encryption does not fail");
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut out = Vec::with_capacity(sealed.len());
    out.extend_from_slice(tag);
    out.extend_from_slice(body);
    out
}

/// Opens `sealed` (tag-prefixed, per [`secretbox_seal`]) under `key`, or fails if the authenticator
/// is invalid.
pub fn secretbox_open(sealed: &[u8], nonce: &[u8; NONCE_LEN], key: &[u8; SYMMETRIC_KEY_LEN]) -> Result<Vec<u8>, AuthenticationFailed> {
    if sealed.len() < TAG_LEN {
        return Err(AuthenticationFailed);
    }
    let (tag, body) = sealed.split_at(TAG_LEN);
    let mut rearranged = Vec::with_capacity(sealed.len());
    rearranged.extend_from_slice(body);
    rearranged.extend_from_slice(tag);

    let cipher = XSalsa20Poly1305::new(key.into());
    cipher.decrypt(Nonce::from_slice(nonce), rearranged.as_slice()).map_err(|_| AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaChaRng;

    use super::*;

    fn rand_key(rng: &mut ChaChaRng) -> [u8; 32] {
        let mut k = [0u8; 32];
        rng.fill_bytes(&mut k);
        k
    }

    #[test]
    fn scalar_base_mult_is_deterministic() {
        let sk = [0xAAu8; 32];
        assert_eq!(scalar_base_mult(&sk), scalar_base_mult(&sk));
    }

    #[test]
    fn box_round_trip() {
        let mut rng = ChaChaRng::seed_from_u64(1);
        let sender_sk = rand_key(&mut rng);
        let receiver_sk = rand_key(&mut rng);
        let receiver_pk = scalar_base_mult(&receiver_sk);
        let nonce = [7u8; NONCE_LEN];

        let ct = box_seal(b"hello", &nonce, &receiver_pk, &sender_sk);
        let sender_pk = scalar_base_mult(&sender_sk);
        let pt = box_open(&ct, &nonce, &sender_pk, &receiver_sk).expect("should open");
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn box_rejects_tamper() {
        let mut rng = ChaChaRng::seed_from_u64(2);
        let sender_sk = rand_key(&mut rng);
        let receiver_sk = rand_key(&mut rng);
        let receiver_pk = scalar_base_mult(&receiver_sk);
        let nonce = [9u8; NONCE_LEN];

        let mut ct = box_seal(b"hello", &nonce, &receiver_pk, &sender_sk);
        ct[0] ^= 1;
        let sender_pk = scalar_base_mult(&sender_sk);
        assert!(box_open(&ct, &nonce, &sender_pk, &receiver_sk).is_err());
    }

    #[test]
    fn secretbox_round_trip() {
        let mut rng = ChaChaRng::seed_from_u64(3);
        let key = rand_key(&mut rng);
        let nonce = [3u8; NONCE_LEN];

        let sealed = secretbox_seal(b"a secret payload chunk", &nonce, &key);
        assert_eq!(&sealed[..TAG_LEN].len(), &TAG_LEN);
        let opened = secretbox_open(&sealed, &nonce, &key).expect("should open");
        assert_eq!(opened, b"a secret payload chunk");
    }

    #[test]
    fn secretbox_tag_is_prefix() {
        let mut rng = ChaChaRng::seed_from_u64(4);
        let key = rand_key(&mut rng);
        let nonce = [5u8; NONCE_LEN];

        let sealed = secretbox_seal(b"x", &nonce, &key);
        assert_eq!(sealed.len(), 1 + TAG_LEN);
        // the tag occupies the first TAG_LEN bytes; flipping it must invalidate the seal.
        let mut tampered = sealed.clone();
        tampered[0] ^= 1;
        assert!(secretbox_open(&tampered, &nonce, &key).is_err());
    }

    #[test]
    fn secretbox_empty_message() {
        let mut rng = ChaChaRng::seed_from_u64(5);
        let key = rand_key(&mut rng);
        let nonce = [0u8; NONCE_LEN];

        let sealed = secretbox_seal(b"", &nonce, &key);
        assert_eq!(sealed.len(), TAG_LEN);
        let opened = secretbox_open(&sealed, &nonce, &key).expect("should open");
        assert!(opened.is_empty());
    }
}
