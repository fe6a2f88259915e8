//! Framing codec for log entries.
//!
//! Every entry is a JSON payload wrapped in a checksummed frame:
//!
//! ```text
//! [version: 1 byte][length: 4 bytes LE][payload: N bytes JSON][crc32: 4 bytes LE]
//! ```
//!
//! Files start with [`MAGIC`] followed by the codec version byte.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use serde::{de::DeserializeOwned, Serialize};

/// Current frame version.
pub const CODEC_VERSION: u8 = 1;

/// Magic bytes at the start of every kgraph log file.
pub const MAGIC: [u8; 4] = *b"KGRF";

/// Largest payload accepted when decoding (64 MiB).
const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

fn invalid(message: impl Into<String>) -> IoError {
    IoError::new(ErrorKind::InvalidData, message.into())
}

/// Frames `value` as one checksummed entry.
///
/// # Errors
/// `InvalidData` if `value` does not serialize or is too large to frame.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let payload =
        serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| invalid(format!("payload of {} bytes cannot be framed", payload.len())))?;

    let mut frame = Vec::with_capacity(payload.len() + 9);
    frame.push(CODEC_VERSION);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(frame)
}

/// Reads and verifies one framed entry.
///
/// # Errors
/// - `UnexpectedEof` if the frame is cut short
/// - `InvalidData` on version mismatch, oversized length, checksum mismatch,
///   or a payload that does not deserialize
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut prefix = [0u8; 5];
    reader.read_exact(&mut prefix)?;

    if prefix[0] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported frame version {} (expected {CODEC_VERSION})",
            prefix[0]
        )));
    }

    let len = u32::from_le_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(invalid(format!(
            "frame length {len} exceeds maximum {MAX_PAYLOAD_LEN}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut crc = [0u8; 4];
    reader.read_exact(&mut crc)?;
    let stored = u32::from_le_bytes(crc);
    let computed = crc32fast::hash(&payload);
    if stored != computed {
        return Err(invalid(format!(
            "checksum mismatch: stored={stored:08x}, computed={computed:08x}"
        )));
    }

    serde_json::from_slice(&payload).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes the file header.
///
/// # Errors
/// Propagates write failures.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])
}

/// Returns true if `bytes` could be the start of a header cut short by a
/// crash.
pub fn is_header_prefix(bytes: &[u8]) -> bool {
    let mut header = [0u8; 5];
    header[..4].copy_from_slice(&MAGIC);
    header[4] = CODEC_VERSION;
    bytes.len() < header.len() && header.starts_with(bytes)
}

/// Reads and validates the file header, returning its version byte.
///
/// # Errors
/// - `UnexpectedEof` if the header is cut short
/// - `InvalidData` on a magic or version mismatch
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;

    if header[..4] != MAGIC {
        return Err(invalid(format!(
            "not a kgraph log: expected magic {MAGIC:?}, found {:?}",
            &header[..4]
        )));
    }
    if header[4] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported log version {} (expected {CODEC_VERSION})",
            header[4]
        )));
    }
    Ok(header[4])
}
