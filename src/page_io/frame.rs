//! Element frame format inside a page data file
//!
//! ```text
//! +------------------+
//! | Sequence Number  | (u64 BE)
//! +------------------+
//! | Data Length      | (u32 BE)
//! +------------------+
//! | Data             | (Data Length bytes)
//! +------------------+
//! | Checksum         | (u32 BE, CRC32 of Data)
//! +------------------+
//! ```
//!
//! A page file starts with a single version byte followed by frames.

use crc32fast::Hasher;

/// Page file format version
pub const PAGE_VERSION: u8 = 1;

/// Size of the page file header (the version byte)
pub const PAGE_HEADER_SIZE: usize = 1;

const SEQ_NUM_SIZE: usize = 8;
const LENGTH_SIZE: usize = 4;
const CHECKSUM_SIZE: usize = 4;

/// Bytes a frame adds around its data
pub const FRAME_OVERHEAD: usize = SEQ_NUM_SIZE + LENGTH_SIZE + CHECKSUM_SIZE;

/// Returns the on-disk size of a frame holding `data_len` bytes.
#[inline]
pub fn frame_size(data_len: usize) -> usize {
    FRAME_OVERHEAD + data_len
}

/// CRC32 over the element data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes one frame.
pub fn encode(seq_num: u64, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(frame_size(data.len()));
    buf.extend_from_slice(&seq_num.to_be_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(&compute_checksum(data).to_be_bytes());
    buf
}

/// A frame decoded from the start of a byte slice
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub seq_num: u64,
    pub data: &'a [u8],
    /// Total bytes the frame occupies
    pub len: usize,
}

/// Why a frame could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDefect {
    /// Fewer bytes than the frame claims; the write was torn
    Truncated { needed: usize, available: usize },
    /// Stored checksum does not match the data
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl std::fmt::Display for FrameDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameDefect::Truncated { needed, available } => {
                write!(f, "truncated frame: needs {} bytes, {} available", needed, available)
            }
            FrameDefect::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                expected, actual
            ),
        }
    }
}

/// Decodes the frame at the start of `bytes`.
///
/// `bytes` must be non-empty; an empty slice is the clean end of a page and is
/// handled by the caller.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame<'_>, FrameDefect> {
    let header = SEQ_NUM_SIZE + LENGTH_SIZE;
    if bytes.len() < header {
        return Err(FrameDefect::Truncated {
            needed: header,
            available: bytes.len(),
        });
    }

    let seq_num = u64::from_be_bytes(read_array(bytes, 0));
    let data_len = u32::from_be_bytes(read_array(bytes, SEQ_NUM_SIZE)) as usize;

    let total = frame_size(data_len);
    if bytes.len() < total {
        return Err(FrameDefect::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }

    let data = &bytes[header..header + data_len];
    let stored = u32::from_be_bytes(read_array(bytes, header + data_len));
    let computed = compute_checksum(data);
    if stored != computed {
        return Err(FrameDefect::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }

    Ok(DecodedFrame {
        seq_num,
        data,
        len: total,
    })
}

/// Returns the size the frame at the start of `bytes` claims, if its header is readable.
pub fn decode_extent(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < SEQ_NUM_SIZE + LENGTH_SIZE {
        return None;
    }
    let data_len = u32::from_be_bytes(read_array(bytes, SEQ_NUM_SIZE)) as usize;
    Some(frame_size(data_len))
}

fn read_array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encoded_frame() {
        let encoded = encode(42, b"payload");
        assert_eq!(encoded.len(), frame_size(7));

        let frame = decode(&encoded).unwrap();
        assert_eq!(frame.seq_num, 42);
        assert_eq!(frame.data, b"payload");
        assert_eq!(frame.len, encoded.len());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = encode(1, b"a");
        bytes.extend_from_slice(&encode(2, b"b"));
        let first = decode(&bytes).unwrap();
        assert_eq!(first.seq_num, 1);
        let second = decode(&bytes[first.len..]).unwrap();
        assert_eq!(second.seq_num, 2);
    }

    #[test]
    fn test_torn_frame_detected() {
        let encoded = encode(7, b"some element data");
        let torn = &encoded[..encoded.len() - 3];
        assert!(matches!(decode(torn), Err(FrameDefect::Truncated { .. })));
        assert!(matches!(decode(&encoded[..5]), Err(FrameDefect::Truncated { .. })));
    }

    #[test]
    fn test_bit_flip_detected() {
        let mut encoded = encode(7, b"some element data");
        encoded[14] ^= 0x01;
        assert!(matches!(
            decode(&encoded),
            Err(FrameDefect::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_payload_frame() {
        let encoded = encode(3, b"");
        assert_eq!(encoded.len(), FRAME_OVERHEAD);
        assert_eq!(decode(&encoded).unwrap().data, b"");
    }
}
