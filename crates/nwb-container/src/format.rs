//! Container file framing.
//!
//! Layout:
//! ```text
//! offset  size  field
//! 0       8     magic  \x89 N W B \r \n \x1a \n
//! 8       4     format version (u32 LE)
//! 12      16    BLAKE3 digest of body, truncated to 128 bits
//! 28      8     body length (u64 LE)
//! 36      n     body (JSON document)
//! ```
//!
//! The magic follows the PNG convention so that line-ending translation or a
//! 7-bit transfer is caught before the body is parsed.

use std::fmt;
use std::io::{self, Write};

use crate::error::ContainerError;

pub const MAGIC: [u8; 8] = *b"\x89NWB\r\n\x1a\n";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 36;

/// BLAKE3 digest of a container body, truncated to 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyChecksum([u8; 16]);

impl BodyChecksum {
    pub fn of(body: &[u8]) -> Self {
        let hash = blake3::hash(body);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BodyChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Write header and body to `sink`, returning the body checksum.
pub fn write_frame<W: Write>(sink: &mut W, body: &[u8]) -> io::Result<BodyChecksum> {
    let checksum = BodyChecksum::of(body);
    sink.write_all(&MAGIC)?;
    sink.write_all(&FORMAT_VERSION.to_le_bytes())?;
    sink.write_all(checksum.as_bytes())?;
    sink.write_all(&(body.len() as u64).to_le_bytes())?;
    sink.write_all(body)?;
    Ok(checksum)
}

/// Validate a whole file image and return the checksum and body slice.
pub fn read_frame(bytes: &[u8]) -> Result<(BodyChecksum, &[u8]), ContainerError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(ContainerError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(ContainerError::Truncated {
            expected: HEADER_LEN as u64,
            found: bytes.len() as u64,
        });
    }

    let version = u32::from_le_bytes(le_array(&bytes[8..12]));
    if version != FORMAT_VERSION {
        return Err(ContainerError::UnsupportedVersion(version));
    }

    let mut expected = [0u8; 16];
    expected.copy_from_slice(&bytes[12..28]);
    let expected = BodyChecksum(expected);

    let body_len = u64::from_le_bytes(le_array(&bytes[28..36]));
    let available = (bytes.len() - HEADER_LEN) as u64;
    if available < body_len {
        return Err(ContainerError::Truncated {
            expected: body_len,
            found: available,
        });
    }
    if available > body_len {
        return Err(ContainerError::TrailingBytes(available - body_len));
    }

    let body = &bytes[HEADER_LEN..];
    let actual = BodyChecksum::of(body);
    if actual != expected {
        return Err(ContainerError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok((actual, body))
}

fn le_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, body).unwrap();
        buf
    }

    #[test]
    fn test_frame_layout() {
        let buf = framed(b"{}");
        assert_eq!(buf.len(), HEADER_LEN + 2);
        assert_eq!(&buf[..8], &MAGIC);

        let (checksum, body) = read_frame(&buf).unwrap();
        assert_eq!(body, b"{}");
        assert_eq!(checksum.to_hex().len(), 32);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = framed(b"{}");
        buf[1] = b'X';
        assert!(matches!(read_frame(&buf), Err(ContainerError::BadMagic)));
        assert!(matches!(read_frame(b""), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn test_truncated_body() {
        let buf = framed(b"{\"identifier\":\"sess01\"}");
        let cut = &buf[..buf.len() - 4];
        assert!(matches!(
            read_frame(cut),
            Err(ContainerError::Truncated { found, .. }) if found == (cut.len() - HEADER_LEN) as u64
        ));
    }

    #[test]
    fn test_truncated_header() {
        let buf = framed(b"{}");
        assert!(matches!(
            read_frame(&buf[..20]),
            Err(ContainerError::Truncated { expected: 36, found: 20 })
        ));
    }

    #[test]
    fn test_corrupted_body() {
        let mut buf = framed(b"{\"a\":1}");
        let last = buf.len() - 2;
        buf[last] = b'2';
        assert!(matches!(
            read_frame(&buf),
            Err(ContainerError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut buf = framed(b"{}");
        buf.extend_from_slice(b"xx");
        assert!(matches!(read_frame(&buf), Err(ContainerError::TrailingBytes(2))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = framed(b"{}");
        buf[8..12].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            read_frame(&buf),
            Err(ContainerError::UnsupportedVersion(7))
        ));
    }
}
