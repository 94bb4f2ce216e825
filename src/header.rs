//! The Format's header: building and parsing the 5-element array, and resolving which recipient
//! slot (if any) a given private key can open.

use std::io::{Read, Write};

use serde_bytes::ByteBuf;

use crate::errors::DecryptError;
use crate::framing::{read_value, write_value, FramingError};
use crate::nonce::NoncePrefix;
use crate::primitives::{self, PrecomputedBox, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SYMMETRIC_KEY_LEN};

/// The format name written into every header.
pub(crate) const FORMAT_NAME: &str = "SaltBox";

/// The only version this crate produces or accepts.
pub(crate) const VERSION: (u32, u32) = (1, 0);

/// The only mode this crate produces or accepts (encryption, as opposed to signing/detached).
pub(crate) const MODE_ENCRYPTION: u32 = 0;

/// A recipient slot: an (ignored) recipient identifier and a wrapped-keys box.
type WireRecipientSlot = (Option<ByteBuf>, ByteBuf);

/// The header's wire representation: a 5-element MessagePack array.
type WireHeader = (String, (u32, u32), u32, ByteBuf, Vec<WireRecipientSlot>);

/// A parsed header, exposed for inspection; the core does not format it.
#[derive(Debug, Clone)]
pub struct Header {
    /// The ephemeral public key generated for this message.
    pub ephemeral_public: [u8; PUBLIC_KEY_LEN],
    /// The number of recipient slots in the header.
    pub recipient_count: usize,
}

pub(crate) struct ParsedHeader {
    pub header: Header,
    pub recipient_boxes: Vec<Vec<u8>>,
}

/// The outcome of successfully locating this recipient's slot.
pub(crate) struct ResolvedRecipient {
    pub index: usize,
    pub sender_public: [u8; PUBLIC_KEY_LEN],
    pub encryption_key: [u8; SYMMETRIC_KEY_LEN],
}

/// Builds and writes the header, given the already-sealed per-recipient wrapped-key boxes (in
/// recipient order). Returns the number of bytes written.
pub(crate) fn write_header<W: Write>(
    writer: &mut W,
    ephemeral_public: &[u8; PUBLIC_KEY_LEN],
    recipient_boxes: &[Vec<u8>],
) -> std::io::Result<u64> {
    // The recipient identifier slot is reserved for an optional explicit recipient public key;
    // this profile always writes null and never reads it back.
    let recipients: Vec<WireRecipientSlot> =
        recipient_boxes.iter().map(|b| (None, ByteBuf::from(b.clone()))).collect();

    let wire: WireHeader = (FORMAT_NAME.to_string(), VERSION, MODE_ENCRYPTION, ByteBuf::from(ephemeral_public.to_vec()), recipients);
    write_value(writer, &wire)
}

/// Parses a header from `reader`, validating its tag, version, and mode.
pub(crate) fn read_header<R: Read>(reader: &mut R) -> Result<ParsedHeader, DecryptError> {
    let wire: WireHeader = read_value(reader).map_err(|e| match e {
        FramingError::Truncated => DecryptError::Truncated,
        FramingError::Io(io_err) => DecryptError::ReadIo(io_err),
        FramingError::Malformed => DecryptError::MalformedHeader,
    })?;
    let (format_name, version, mode, ephemeral_public, recipients) = wire;

    if format_name != FORMAT_NAME {
        return Err(DecryptError::MalformedHeader);
    }
    if version != VERSION {
        return Err(DecryptError::UnsupportedVersion);
    }
    if mode != MODE_ENCRYPTION {
        return Err(DecryptError::UnsupportedMode);
    }

    let ephemeral_public: [u8; PUBLIC_KEY_LEN] =
        ephemeral_public.into_vec().try_into().map_err(|_| DecryptError::MalformedHeader)?;

    let recipient_boxes: Vec<Vec<u8>> = recipients.into_iter().map(|(_ignored_id, wrapped)| wrapped.into_vec()).collect();

    Ok(ParsedHeader {
        header: Header { ephemeral_public, recipient_count: recipient_boxes.len() },
        recipient_boxes,
    })
}

/// Walks the recipient slots in order, attempting to open each with the ephemeral-public/
/// recipient-private precomputed shared secret. The first slot that opens wins; later slots, even
/// if they would also open, are never examined.
pub(crate) fn resolve_recipient(
    ephemeral_public: &[u8; PUBLIC_KEY_LEN],
    recipient_sk: &[u8; PRIVATE_KEY_LEN],
    recipient_boxes: &[Vec<u8>],
) -> Result<ResolvedRecipient, DecryptError> {
    let nonce0 = NoncePrefix::derive(ephemeral_public).nonce(0);
    let ephemeral_beforenm = PrecomputedBox::new(ephemeral_public, recipient_sk);

    for (index, wrapped) in recipient_boxes.iter().enumerate() {
        // An open failure here is the expected, silent "not my slot" signal, not an error: it is
        // only promoted to NoMatchingRecipient once every slot has failed.
        let Ok(plaintext) = ephemeral_beforenm.open(&nonce0, wrapped) else { continue };

        let (sender_public, encryption_key): (ByteBuf, ByteBuf) =
            rmp_serde::from_slice(&plaintext).map_err(|_| DecryptError::MalformedHeader)?;
        let sender_public: [u8; PUBLIC_KEY_LEN] =
            sender_public.into_vec().try_into().map_err(|_| DecryptError::MalformedHeader)?;
        let encryption_key: [u8; SYMMETRIC_KEY_LEN] =
            encryption_key.into_vec().try_into().map_err(|_| DecryptError::MalformedHeader)?;

        return Ok(ResolvedRecipient { index, sender_public, encryption_key });
    }

    Err(DecryptError::NoMatchingRecipient)
}

/// Builds the per-recipient wrapped-keys box: `box_seal(pack([sender_public, encryption_key]),
/// Nonce(0), recipient_public, ephemeral_private)`.
pub(crate) fn wrap_keys_for_recipient(
    recipient_public: &[u8; PUBLIC_KEY_LEN],
    ephemeral_private: &[u8; PRIVATE_KEY_LEN],
    header_nonce: &[u8; primitives::NONCE_LEN],
    sender_public: &[u8; PUBLIC_KEY_LEN],
    encryption_key: &[u8; SYMMETRIC_KEY_LEN],
) -> Vec<u8> {
    let keys_bytes = rmp_serde::to_vec(&(ByteBuf::from(sender_public.to_vec()), ByteBuf::from(encryption_key.to_vec())))
        .expect("key pair always serializes");
    primitives::box_seal(&keys_bytes, header_nonce, recipient_public, ephemeral_private)
}
