//! Length-delimited MessagePack framing over a byte source.
//!
//! The Format's header and every payload packet are each a single MessagePack value; this module
//! knows nothing about their shapes, only how to read or write one framed value at a time from a
//! [`std::io::Read`]/[`std::io::Write`] stream. [`crate::header`] and [`crate::mres`] build the
//! Format's actual wire types on top of it.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// An error arising from the framing layer itself, before any Format-specific meaning (header
/// shape, recipient count, …) has been applied.
pub(crate) enum FramingError {
    /// The byte source ended in the middle of a value.
    Truncated,
    /// The bytes did not decode as a value of the expected shape.
    Malformed,
    /// A genuine I/O error (as opposed to a clean EOF) occurred while reading.
    Io(io::Error),
}

/// Serializes `value` as a single MessagePack value and writes it to `writer`, returning the
/// number of bytes written.
pub(crate) fn write_value<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<u64> {
    let bytes = rmp_serde::to_vec(value).expect("Format values always serialize");
    writer.write_all(&bytes)?;
    Ok(bytes.len() as u64)
}

/// Reads and decodes a single MessagePack value from `reader`, advancing the cursor exactly past
/// it and leaving any following values untouched.
pub(crate) fn read_value<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FramingError> {
    match rmp_serde::from_read(reader) {
        Ok(value) => Ok(value),
        Err(rmp_serde::decode::Error::InvalidMarkerRead(e) | rmp_serde::decode::Error::InvalidDataRead(e)) => {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Err(FramingError::Truncated)
            } else {
                Err(FramingError::Io(e))
            }
        }
        Err(_) => Err(FramingError::Malformed),
    }
}

/// Returns whether `reader` is at end-of-stream, by attempting to read one more byte.
///
/// Only meaningful as a final check after the caller has consumed everything it expects to find;
/// if this returns `Ok(false)`, the byte it read is lost, which is fine because the caller treats
/// that case as fatal (`TrailingData`) and does not keep reading.
pub(crate) fn at_eof<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut probe = [0u8; 1];
    Ok(reader.read(&mut probe)? == 0)
}
