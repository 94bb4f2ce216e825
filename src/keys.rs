//! Typed wrappers around the raw key material used throughout the crate.

use std::fmt::{self, Debug, Formatter};
use std::io::{Read, Write};

use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

use crate::errors::{DecryptError, EncryptError};
use crate::mres::{self, Packet, DEFAULT_CHUNK_SIZE};
use crate::primitives::{random_bytes, scalar_base_mult, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN};

/// An X25519 public key.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PublicKey {
    encoded: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Wraps a raw 32-byte public key.
    #[must_use]
    pub fn from_bytes(encoded: [u8; PUBLIC_KEY_LEN]) -> PublicKey {
        PublicKey { encoded }
    }

    /// Returns the public key's raw bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_LEN] {
        self.encoded
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({:02x?})", self.encoded)
    }
}

/// An X25519 private key, along with its corresponding [`PublicKey`].
///
/// Zeroizes its scalar on drop; the corresponding public key is not sensitive and is left intact.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecretKey {
    #[zeroize(skip)]
    public_key: PublicKey,
    encoded: [u8; PRIVATE_KEY_LEN],
}

impl SecretKey {
    /// Generates a new random private key.
    pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Result<SecretKey, rand::Error> {
        let encoded: [u8; PRIVATE_KEY_LEN] = random_bytes(rng)?;
        Ok(SecretKey::from_bytes(encoded))
    }

    /// Wraps a raw 32-byte private scalar, deriving its public key.
    #[must_use]
    pub fn from_bytes(encoded: [u8; PRIVATE_KEY_LEN]) -> SecretKey {
        let public_key = PublicKey::from_bytes(scalar_base_mult(&encoded));
        SecretKey { public_key, encoded }
    }

    /// Returns the private key's raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.encoded
    }

    /// Returns this key's corresponding public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Encrypts the entirety of `plaintext` for `recipients`, writing the framed ciphertext to
    /// `writer`. See [`mres::encrypt`].
    pub fn encrypt<R, W>(
        &self,
        rng: &mut (impl RngCore + CryptoRng),
        plaintext: &mut R,
        recipients: &[PublicKey],
        writer: &mut W,
    ) -> Result<u64, EncryptError>
    where
        R: Read,
        W: Write,
    {
        self.encrypt_with_chunk_size(rng, plaintext, recipients, DEFAULT_CHUNK_SIZE, writer)
    }

    /// As [`SecretKey::encrypt`], but with an explicit chunk size.
    pub fn encrypt_with_chunk_size<R, W>(
        &self,
        rng: &mut (impl RngCore + CryptoRng),
        plaintext: &mut R,
        recipients: &[PublicKey],
        chunk_size: u32,
        writer: &mut W,
    ) -> Result<u64, EncryptError>
    where
        R: Read,
        W: Write,
    {
        let recipients_pk: Vec<[u8; PUBLIC_KEY_LEN]> = recipients.iter().map(|pk| pk.to_bytes()).collect();
        mres::encrypt(rng, &self.encoded, &recipients_pk, plaintext, chunk_size, writer)
    }

    /// Decrypts the message in `reader`, writing the recovered plaintext to `writer`. See
    /// [`mres::decrypt`].
    pub fn decrypt<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<u64, DecryptError>
    where
        R: Read,
        W: Write,
    {
        mres::decrypt(reader, &self.encoded, writer)
    }

    /// As [`SecretKey::decrypt`], but invokes `inspect` with each packet's shape as it is parsed.
    /// See [`mres::decrypt_with_inspect`].
    pub fn decrypt_with_inspect<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        inspect: &mut dyn FnMut(&Packet),
    ) -> Result<u64, DecryptError>
    where
        R: Read,
        W: Write,
    {
        mres::decrypt_with_inspect(reader, &self.encoded, writer, Some(inspect))
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({:?})", self.public_key)
    }
}

impl Eq for SecretKey {}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}
