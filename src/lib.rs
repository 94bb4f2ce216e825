#![warn(missing_docs)]

//! An authenticated, multi-recipient, streaming public-key encryption format.
//!
//! SaltBox lets a sender encrypt a message for any number of recipients at once: each recipient
//! can decrypt the message on their own, without learning who else (if anyone) else could also
//! decrypt it, and every recipient who can decrypt it is assured it was sent by whoever holds the
//! sender's private key. Messages are streamed in fixed-size chunks so that neither encryption nor
//! decryption needs to hold the entire plaintext or ciphertext in memory at once.
//!
//! ```
//! use std::io::Cursor;
//!
//! use rand::rngs::OsRng;
//! use saltbox::SecretKey;
//!
//! let mut rng = OsRng;
//!
//! // Alice and Bea each generate a key pair.
//! let alice = SecretKey::random(&mut rng).expect("rng failure");
//! let bea = SecretKey::random(&mut rng).expect("rng failure");
//!
//! // Alice encrypts a message for Bea.
//! let mut ciphertext = Cursor::new(Vec::new());
//! alice
//!     .encrypt(&mut rng, &mut Cursor::new("this is a secret message"), &[bea.public_key()], &mut ciphertext)
//!     .expect("encryption failed");
//!
//! // Bea decrypts the message.
//! let mut plaintext = Cursor::new(Vec::new());
//! bea.decrypt(&mut Cursor::new(ciphertext.into_inner()), &mut plaintext).expect("decryption failed");
//!
//! assert_eq!(b"this is a secret message".to_vec(), plaintext.into_inner());
//! ```

pub use errors::{DecryptError, EncryptError};
pub use keys::{PublicKey, SecretKey};
pub use mres::{Packet, DEFAULT_CHUNK_SIZE};
pub use header::Header;

pub mod errors;
mod framing;
pub mod header;
pub mod keys;
pub mod mres;
mod nonce;
pub mod primitives;
