use std::io;

use thiserror::Error;

/// An error returned when encrypting a message was unsuccessful.
#[derive(Debug, Error)]
pub enum EncryptError {
    /// `chunk_size` was zero, or some other caller-supplied argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The CSPRNG failed to produce the ephemeral key pair or the message encryption key.
    #[error("rng failure")]
    RngFailure,

    /// Encryption was unsuccessful due to an IO error reading the plaintext.
    #[error("error reading plaintext")]
    ReadIo(#[source] io::Error),

    /// Encryption was unsuccessful due to an IO error writing the ciphertext.
    #[error("error writing ciphertext")]
    WriteIo(#[source] io::Error),
}

/// An error returned when decrypting a message was unsuccessful.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// The header was not a 5-element array of the expected shape, or its `format_name` did not
    /// match `"SaltBox"`.
    #[error("malformed header")]
    MalformedHeader,

    /// The header's version was not `[1, 0]`.
    #[error("unsupported format version")]
    UnsupportedVersion,

    /// The header's mode was not `0` (encryption).
    #[error("unsupported mode")]
    UnsupportedMode,

    /// No recipient slot in the header could be opened with the given private key.
    #[error("no recipient slot matches the given private key")]
    NoMatchingRecipient,

    /// A payload packet was not a 2-element array, or its tag-box count disagreed with the
    /// header's recipient count.
    #[error("malformed payload packet")]
    MalformedPacket,

    /// A cryptographic open operation (tag box or payload secretbox) failed to verify.
    ///
    /// The ciphertext may have been altered, truncated, reordered, or produced by a different
    /// sender than the one named in the header.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The byte source ended before a terminating empty-chunk packet was read.
    #[error("truncated: missing end-of-message sentinel")]
    Truncated,

    /// Bytes remained in the byte source after the terminating empty-chunk packet.
    #[error("trailing data after end-of-message sentinel")]
    TrailingData,

    /// Decryption was unsuccessful due to an IO error reading the ciphertext.
    #[error("error reading ciphertext")]
    ReadIo(#[source] io::Error),

    /// Decryption was unsuccessful due to an IO error writing the plaintext.
    #[error("error writing plaintext")]
    WriteIo(#[source] io::Error),
}
