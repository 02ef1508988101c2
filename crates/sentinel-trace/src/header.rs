//! Optional 32-byte `SNTL` file header preceding the record stream.
//!
//! ```text
//!  0..4   magic       "SNTL"
//!  4      version     >= 1
//!  5      endianness  0 = little (only supported value)
//!  6..8   record_size must equal RECORD_SIZE
//!  8..12  clock_mhz   > 0
//! 12..16  run_id
//! 16..24  record_count (0 = unknown / streaming)
//! 24..32  reserved    must be zero
//! ```
//!
//! A record stream can begin with the bytes `SNTL` too (a `tx_id` whose low
//! bytes spell the magic). Bytes 26..28 of a record hold its opcode, which is
//! never zero, so a header is only recognized when the whole reserved tail
//! is zero. Anything else decodes as a headerless stream.

use crate::record::RECORD_SIZE;
use serde::Serialize;
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"SNTL";
pub const HEADER_SIZE: usize = 32;
const RESERVED: std::ops::Range<usize> = 24..HEADER_SIZE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header too short: {0} < {HEADER_SIZE} bytes")]
    TooShort(usize),

    #[error("invalid magic {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported header version {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported endianness {0} (only little-endian is supported)")]
    UnsupportedEndianness(u8),

    #[error("record size {0} does not match decoder record size {RECORD_SIZE}")]
    RecordSize(u16),

    #[error("clock frequency must be non-zero")]
    ZeroClock,

    #[error("reserved header bytes are not zero")]
    ReservedNonZero,
}

/// Parsed trace file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub version: u8,
    pub endianness: u8,
    pub record_size: u16,
    pub clock_mhz: u32,
    pub run_id: u32,
    /// Declared number of records; 0 when the writer did not know it.
    pub record_count: u64,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            version: 1,
            endianness: 0,
            record_size: RECORD_SIZE as u16,
            clock_mhz: 100,
            run_id: 0,
            record_count: 0,
        }
    }
}

impl FileHeader {
    /// Whether `bytes` begins with something that claims to be a header:
    /// the magic, a full header length, and a zero reserved tail.
    ///
    /// A claimed header may still fail [`FileHeader::validate`].
    pub fn probe(bytes: &[u8]) -> bool {
        bytes.len() >= HEADER_SIZE
            && bytes[..MAGIC.len()] == MAGIC
            && bytes[RESERVED].iter().all(|&b| b == 0)
    }

    /// Parse and validate a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort(bytes.len()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }
        if bytes[RESERVED].iter().any(|&b| b != 0) {
            return Err(HeaderError::ReservedNonZero);
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[16..24]);
        let header = Self {
            version: bytes[4],
            endianness: bytes[5],
            record_size: u16::from_le_bytes([bytes[6], bytes[7]]),
            clock_mhz: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            run_id: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            record_count: u64::from_le_bytes(count),
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.version == 0 {
            return Err(HeaderError::UnsupportedVersion(self.version));
        }
        if self.endianness != 0 {
            return Err(HeaderError::UnsupportedEndianness(self.endianness));
        }
        if usize::from(self.record_size) != RECORD_SIZE {
            return Err(HeaderError::RecordSize(self.record_size));
        }
        if self.clock_mhz == 0 {
            return Err(HeaderError::ZeroClock);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.version;
        out[5] = self.endianness;
        out[6..8].copy_from_slice(&self.record_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.clock_mhz.to_le_bytes());
        out[12..16].copy_from_slice(&self.run_id.to_le_bytes());
        out[16..24].copy_from_slice(&self.record_count.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_header_roundtrips() {
        let header = FileHeader {
            run_id: 7,
            record_count: 1234,
            ..FileHeader::default()
        };
        let bytes = header.to_bytes();
        assert!(FileHeader::probe(&bytes));
        assert_eq!(FileHeader::parse(&bytes).unwrap(), header);
        assert_eq!(&bytes[24..], &[0u8; 8]);
    }

    #[test]
    fn rejects_big_endian() {
        let header = FileHeader {
            endianness: 1,
            ..FileHeader::default()
        };
        assert_eq!(
            FileHeader::parse(&header.to_bytes()),
            Err(HeaderError::UnsupportedEndianness(1))
        );
    }

    #[test]
    fn rejects_foreign_record_size() {
        let header = FileHeader {
            record_size: 48,
            ..FileHeader::default()
        };
        assert_eq!(
            FileHeader::parse(&header.to_bytes()),
            Err(HeaderError::RecordSize(48))
        );
    }

    #[test]
    fn short_input_is_not_a_header() {
        assert_eq!(FileHeader::parse(b"SNTL"), Err(HeaderError::TooShort(4)));
        assert!(!FileHeader::probe(b"SNT"));
        assert!(!FileHeader::probe(b"SNTL"));
        assert!(!FileHeader::probe(&[0u8; 32]));
    }

    #[test]
    fn nonzero_reserved_tail_is_not_a_header() {
        let mut bytes = FileHeader::default().to_bytes();
        assert!(FileHeader::probe(&bytes));
        bytes[26] = 0x01;
        assert!(!FileHeader::probe(&bytes));
        assert_eq!(FileHeader::parse(&bytes), Err(HeaderError::ReservedNonZero));
    }

    #[test]
    fn zero_version_and_clock_rejected() {
        let mut header = FileHeader {
            version: 0,
            ..FileHeader::default()
        };
        assert_eq!(header.validate(), Err(HeaderError::UnsupportedVersion(0)));
        header.version = 1;
        header.clock_mhz = 0;
        assert_eq!(header.validate(), Err(HeaderError::ZeroClock));
    }
}
