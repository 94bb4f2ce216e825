//! The payload pipeline and the crate's top-level encrypt/decrypt API.

use std::io::{Read, Write};

use rand::{CryptoRng, RngCore};
use serde_bytes::ByteBuf;

use zeroize::Zeroize;

use crate::errors::{DecryptError, EncryptError};
use crate::framing::{at_eof, read_value, write_value, FramingError};
use crate::header::{read_header, resolve_recipient, wrap_keys_for_recipient, write_header};
use crate::nonce::NoncePrefix;
use crate::primitives::{self, random_bytes, PrecomputedBox, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SYMMETRIC_KEY_LEN};

/// The chunk size used when a caller does not specify one.
pub const DEFAULT_CHUNK_SIZE: u32 = 1_000_000;

/// The first payload packet uses counter `2`; counter `0` belongs to the header's recipient boxes
/// and counter `1` is reserved.
const FIRST_PACKET_COUNTER: u64 = 2;

/// A payload packet's wire representation: the per-recipient tag boxes (in header order) and the
/// tag-stripped ciphertext body.
type WirePacket = (Vec<ByteBuf>, ByteBuf);

/// A parsed packet, exposed to [`decrypt_with_inspect`]'s inspection hook.
#[derive(Debug, Clone, Copy)]
pub struct Packet {
    /// The number of per-recipient tag boxes carried by this packet.
    pub tag_box_count: usize,
    /// The length, in bytes, of the packet's ciphertext body (excluding the tag).
    pub body_len: usize,
    /// Whether this packet was the terminating empty-chunk sentinel.
    pub is_sentinel: bool,
}

/// Encrypts the entirety of `plaintext` for `recipients_pk`, signed (in the dual-authentication
/// sense described below, not a detached signature) by `sender_sk`, writing the framed ciphertext
/// to `writer`. Returns the number of ciphertext bytes written.
///
/// `chunk_size` must be nonzero. `recipients_pk` may be empty; the resulting header then carries
/// zero recipient slots and nobody can later decrypt the message. Self-addressing (a message the
/// sender itself can decrypt) is achieved by having the caller include `sender_sk`'s own public key
/// in `recipients_pk`, like any other recipient; the core does not do this implicitly.
pub fn encrypt<R, W>(
    rng: &mut (impl RngCore + CryptoRng),
    sender_sk: &[u8; PRIVATE_KEY_LEN],
    recipients_pk: &[[u8; PUBLIC_KEY_LEN]],
    plaintext: &mut R,
    chunk_size: u32,
    writer: &mut W,
) -> Result<u64, EncryptError>
where
    R: Read,
    W: Write,
{
    if chunk_size == 0 {
        return Err(EncryptError::InvalidArgument("chunk_size must be nonzero"));
    }

    let sender_pk = primitives::scalar_base_mult(sender_sk);

    let ephemeral_sk: [u8; PRIVATE_KEY_LEN] = random_bytes(rng).map_err(|_| EncryptError::RngFailure)?;
    let ephemeral_pk = primitives::scalar_base_mult(&ephemeral_sk);
    let mut encryption_key: [u8; SYMMETRIC_KEY_LEN] = random_bytes(rng).map_err(|_| EncryptError::RngFailure)?;

    let nonce0 = NoncePrefix::derive(&ephemeral_pk).nonce(0);
    let recipient_boxes: Vec<Vec<u8>> = recipients_pk
        .iter()
        .map(|recipient_pk| wrap_keys_for_recipient(recipient_pk, &ephemeral_sk, &nonce0, &sender_pk, &encryption_key))
        .collect();

    let mut written = write_header(writer, &ephemeral_pk, &recipient_boxes).map_err(EncryptError::WriteIo)?;

    let prefix = NoncePrefix::derive(&ephemeral_pk);
    // Tag boxes are keyed by the sender's long-term key, not the ephemeral one: this is what lets a
    // recipient confirm a packet truly came from the claimed sender, rather than merely from
    // whoever generated this message's ephemeral key pair (the dual-authentication property).
    let tag_boxes: Vec<PrecomputedBox> = recipients_pk.iter().map(|pk| PrecomputedBox::new(pk, sender_sk)).collect();

    let mut counter = FIRST_PACKET_COUNTER;
    let mut chunk = vec![0u8; chunk_size as usize];
    loop {
        let n = read_full(plaintext, &mut chunk).map_err(EncryptError::ReadIo)?;
        if n == 0 {
            break;
        }

        written += write_packet(writer, &prefix, &tag_boxes, counter, &chunk[..n], &encryption_key)?;
        counter += 1;

        if n < chunk.len() {
            break;
        }
    }

    // The terminating sentinel is always its own, separate empty-bodied packet (never conflated
    // with a short final data chunk), so a reader always knows it has reached the end once it sees
    // one.
    written += write_packet(writer, &prefix, &tag_boxes, counter, &[], &encryption_key)?;

    let mut ephemeral_sk = ephemeral_sk;
    ephemeral_sk.zeroize();
    encryption_key.zeroize();

    Ok(written)
}

fn write_packet<W: Write>(
    writer: &mut W,
    prefix: &NoncePrefix,
    tag_boxes: &[PrecomputedBox],
    counter: u64,
    chunk: &[u8],
    encryption_key: &[u8; SYMMETRIC_KEY_LEN],
) -> Result<u64, EncryptError> {
    let nonce = prefix.nonce(counter);
    let sealed = primitives::secretbox_seal(chunk, &nonce, encryption_key);
    let (tag, body) = sealed.split_at(primitives::TAG_LEN);

    let wrapped_tags: Vec<ByteBuf> =
        tag_boxes.iter().map(|tag_box| ByteBuf::from(tag_box.seal(&nonce, tag))).collect();

    let packet: WirePacket = (wrapped_tags, ByteBuf::from(body.to_vec()));
    write_value(writer, &packet).map_err(EncryptError::WriteIo)
}

/// Decrypts the message in `reader` using `recipient_sk`, writing the recovered plaintext to
/// `writer`. Returns the number of plaintext bytes written.
pub fn decrypt<R, W>(reader: &mut R, recipient_sk: &[u8; PRIVATE_KEY_LEN], writer: &mut W) -> Result<u64, DecryptError>
where
    R: Read,
    W: Write,
{
    decrypt_with_inspect(reader, recipient_sk, writer, None)
}

/// As [`decrypt`], but invokes `inspect` with each [`Packet`]'s shape (and the header, via its own
/// return) as it is processed, before that packet's contents are authenticated. This exists solely
/// to let callers observe the parsed structure; it has no bearing on whether decryption ultimately
/// succeeds.
pub fn decrypt_with_inspect<R, W>(
    reader: &mut R,
    recipient_sk: &[u8; PRIVATE_KEY_LEN],
    writer: &mut W,
    mut inspect: Option<&mut dyn FnMut(&Packet)>,
) -> Result<u64, DecryptError>
where
    R: Read,
    W: Write,
{
    let parsed = read_header(reader)?;
    let resolved = resolve_recipient(&parsed.header.ephemeral_public, recipient_sk, &parsed.recipient_boxes)?;

    let prefix = NoncePrefix::derive(&parsed.header.ephemeral_public);
    let sender_tag_box = PrecomputedBox::new(&resolved.sender_public, recipient_sk);

    let mut written = 0u64;
    let mut counter = FIRST_PACKET_COUNTER;
    let mut saw_sentinel = false;

    loop {
        let packet: WirePacket = read_value(reader).map_err(|e| match e {
            FramingError::Truncated => DecryptError::Truncated,
            FramingError::Io(io_err) => DecryptError::ReadIo(io_err),
            FramingError::Malformed => DecryptError::MalformedPacket,
        })?;
        let (wrapped_tags, body) = packet;

        if wrapped_tags.len() != parsed.header.recipient_count {
            return Err(DecryptError::MalformedPacket);
        }

        let nonce = prefix.nonce(counter);
        let tag_box = wrapped_tags.get(resolved.index).ok_or(DecryptError::MalformedPacket)?;
        let tag = sender_tag_box.open(&nonce, tag_box).map_err(|_| DecryptError::AuthenticationFailed)?;
        if tag.len() != primitives::TAG_LEN {
            return Err(DecryptError::MalformedPacket);
        }

        let mut sealed = Vec::with_capacity(primitives::TAG_LEN + body.len());
        sealed.extend_from_slice(&tag);
        sealed.extend_from_slice(&body);
        let plaintext =
            primitives::secretbox_open(&sealed, &nonce, &resolved.encryption_key).map_err(|_| DecryptError::AuthenticationFailed)?;

        let is_sentinel = plaintext.is_empty();
        if let Some(hook) = inspect.as_deref_mut() {
            hook(&Packet { tag_box_count: wrapped_tags.len(), body_len: body.len(), is_sentinel });
        }

        if is_sentinel {
            saw_sentinel = true;
            break;
        }

        writer.write_all(&plaintext).map_err(DecryptError::WriteIo)?;
        written += plaintext.len() as u64;
        counter += 1;
    }

    if !saw_sentinel {
        return Err(DecryptError::Truncated);
    }
    if !at_eof(reader).map_err(DecryptError::ReadIo)? {
        return Err(DecryptError::TrailingData);
    }

    Ok(written)
}

/// Reads from `reader` until `buf` is completely filled or EOF is reached, returning the number of
/// bytes actually read (which is less than `buf.len()` only at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    use super::*;
    use crate::header as header_mod;

    fn keypair(rng: &mut ChaChaRng) -> ([u8; PRIVATE_KEY_LEN], [u8; PUBLIC_KEY_LEN]) {
        let sk = random_bytes(rng).expect("rng");
        let pk = primitives::scalar_base_mult(&sk);
        (sk, pk)
    }

    #[test]
    fn round_trip_single_recipient() {
        let mut rng = ChaChaRng::seed_from_u64(10);
        let (sender_sk, _sender_pk) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let message = b"a message that spans more than one chunk boundary test case";
        let mut plaintext = Cursor::new(message.to_vec());
        let mut ciphertext = Cursor::new(Vec::new());

        let n = encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, 8, &mut ciphertext).expect("encrypts");
        assert_eq!(ciphertext.get_ref().len() as u64, n);

        let mut reader = Cursor::new(ciphertext.into_inner());
        let mut out = Cursor::new(Vec::new());
        let written = decrypt(&mut reader, &recipient_sk, &mut out).expect("decrypts");
        assert_eq!(out.into_inner(), message.to_vec());
        assert_eq!(written, message.len() as u64);
    }

    #[test]
    fn round_trip_multi_recipient_and_order_independence() {
        let mut rng = ChaChaRng::seed_from_u64(11);
        let (sender_sk, _sender_pk) = keypair(&mut rng);
        let (sk_a, pk_a) = keypair(&mut rng);
        let (sk_b, pk_b) = keypair(&mut rng);
        let (sk_c, pk_c) = keypair(&mut rng);

        let message = b"shared secret for three readers";
        let mut plaintext = Cursor::new(message.to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[pk_a, pk_b, pk_c], &mut plaintext, DEFAULT_CHUNK_SIZE, &mut ciphertext).expect("encrypts");
        let bytes = ciphertext.into_inner();

        for sk in [&sk_a, &sk_b, &sk_c] {
            let mut reader = Cursor::new(bytes.clone());
            let mut out = Cursor::new(Vec::new());
            decrypt(&mut reader, sk, &mut out).expect("each recipient decrypts independently");
            assert_eq!(out.into_inner(), message.to_vec());
        }
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let mut rng = ChaChaRng::seed_from_u64(12);
        let (sender_sk, _) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(Vec::new());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, DEFAULT_CHUNK_SIZE, &mut ciphertext).expect("encrypts");

        let mut reader = Cursor::new(ciphertext.into_inner());
        let mut out = Cursor::new(Vec::new());
        let written = decrypt(&mut reader, &recipient_sk, &mut out).expect("decrypts");
        assert_eq!(written, 0);
        assert!(out.into_inner().is_empty());
    }

    #[test]
    fn chunk_size_does_not_affect_recovered_plaintext() {
        let message = [7u8; 50];
        for chunk_size in [1u32, 7, 50, 1000] {
            let mut rng = ChaChaRng::seed_from_u64(13);
            let (sender_sk, _) = keypair(&mut rng);
            let (recipient_sk, recipient_pk) = keypair(&mut rng);

            let mut plaintext = Cursor::new(message.to_vec());
            let mut ciphertext = Cursor::new(Vec::new());
            encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, chunk_size, &mut ciphertext).expect("encrypts");

            let mut reader = Cursor::new(ciphertext.into_inner());
            let mut out = Cursor::new(Vec::new());
            decrypt(&mut reader, &recipient_sk, &mut out).expect("decrypts");
            assert_eq!(out.into_inner(), message.to_vec());
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut rng = ChaChaRng::seed_from_u64(14);
        let (sender_sk, _) = keypair(&mut rng);
        let (_recipient_sk, recipient_pk) = keypair(&mut rng);
        let mut plaintext = Cursor::new(Vec::new());
        let mut ciphertext = Cursor::new(Vec::new());
        assert_matches!(
            encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, 0, &mut ciphertext),
            Err(EncryptError::InvalidArgument(_))
        );
    }

    #[test]
    fn wrong_key_cannot_decrypt() {
        let mut rng = ChaChaRng::seed_from_u64(15);
        let (sender_sk, _) = keypair(&mut rng);
        let (_recipient_sk, recipient_pk) = keypair(&mut rng);
        let (other_sk, _other_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(b"hello".to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, DEFAULT_CHUNK_SIZE, &mut ciphertext).expect("encrypts");

        let mut reader = Cursor::new(ciphertext.into_inner());
        let mut out = Cursor::new(Vec::new());
        assert_matches!(decrypt(&mut reader, &other_sk, &mut out), Err(DecryptError::NoMatchingRecipient));
    }

    #[test]
    fn tampered_body_fails_authentication() {
        let mut rng = ChaChaRng::seed_from_u64(16);
        let (sender_sk, _) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(b"hello world".to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, DEFAULT_CHUNK_SIZE, &mut ciphertext).expect("encrypts");
        let mut bytes = ciphertext.into_inner();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;

        let mut reader = Cursor::new(bytes);
        let mut out = Cursor::new(Vec::new());
        assert_matches!(decrypt(&mut reader, &recipient_sk, &mut out), Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn truncated_stream_without_sentinel_is_rejected() {
        let mut rng = ChaChaRng::seed_from_u64(17);
        let (sender_sk, _) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(b"hello world, this is long enough to chunk".to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, 4, &mut ciphertext).expect("encrypts");
        let mut bytes = ciphertext.into_inner();
        bytes.truncate(bytes.len() - 1);

        let mut reader = Cursor::new(bytes);
        let mut out = Cursor::new(Vec::new());
        assert_matches!(decrypt(&mut reader, &recipient_sk, &mut out), Err(DecryptError::Truncated));
    }

    #[test]
    fn trailing_data_after_sentinel_is_rejected() {
        let mut rng = ChaChaRng::seed_from_u64(18);
        let (sender_sk, _) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(b"hello".to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, DEFAULT_CHUNK_SIZE, &mut ciphertext).expect("encrypts");
        let mut bytes = ciphertext.into_inner();
        bytes.push(0xC0); // an extra msgpack nil value

        let mut reader = Cursor::new(bytes);
        let mut out = Cursor::new(Vec::new());
        assert_matches!(decrypt(&mut reader, &recipient_sk, &mut out), Err(DecryptError::TrailingData));
    }

    #[test]
    fn reordered_packets_fail_authentication() {
        let mut rng = ChaChaRng::seed_from_u64(19);
        let (sender_sk, _) = keypair(&mut rng);
        let (recipient_sk, recipient_pk) = keypair(&mut rng);

        let mut plaintext = Cursor::new(b"abcdefgh".to_vec());
        let mut ciphertext = Cursor::new(Vec::new());
        encrypt(&mut rng, &sender_sk, &[recipient_pk], &mut plaintext, 2, &mut ciphertext).expect("encrypts");
        let bytes = ciphertext.into_inner();

        // Reparse into individual packets, then swap the first two payload packets (after the
        // header) and reassemble, simulating a reordering attack.
        let mut reader = Cursor::new(bytes);
        let parsed = header_mod::read_header(&mut reader).expect("header parses");
        let mut header_buf = Vec::new();
        write_header(&mut header_buf, &parsed.header.ephemeral_public, &parsed.recipient_boxes).unwrap();

        let mut packets: Vec<WirePacket> = Vec::new();
        loop {
            let packet: WirePacket = read_value(&mut reader).expect("packet parses");
            let is_sentinel = packet.1.is_empty();
            packets.push(packet);
            if is_sentinel {
                break;
            }
        }
        assert!(packets.len() >= 2, "need at least two payload packets for this test");
        packets.swap(0, 1);

        let mut tampered = header_buf;
        for packet in &packets {
            write_value(&mut tampered, packet).unwrap();
        }

        let mut reader = Cursor::new(tampered);
        let mut out = Cursor::new(Vec::new());
        assert_matches!(decrypt(&mut reader, &recipient_sk, &mut out), Err(DecryptError::AuthenticationFailed));
    }
}
