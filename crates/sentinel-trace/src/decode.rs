//! Binary trace decoding.
//!
//! [`TraceDecoder`] is a lazy iterator over a borrowed byte slice. It holds
//! nothing but the slice and a cursor, so decoding the same bytes twice
//! always yields the same records. It yields at most one error and then
//! ends.
//!
//! [`decode`] collects the iterator under a [`DecodeMode`]: strict callers
//! get an error at the first fault (still carrying the good prefix),
//! best-effort callers get the prefix plus the corruption as data.

use crate::header::{FileHeader, HeaderError, HEADER_SIZE};
use crate::record::{RawRecord, RecordError, TraceRecord, RECORD_SIZE};
use log::{debug, warn};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════

/// Why decoding stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptReason {
    #[error("truncated record ({remaining} of {RECORD_SIZE} bytes)")]
    Truncated { remaining: usize },

    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("t_egress {t_egress} precedes t_ingress {t_ingress}")]
    EgressBeforeIngress { t_ingress: u64, t_egress: u64 },

    #[error("bad file header: {0}")]
    BadHeader(#[from] HeaderError),
}

impl From<RecordError> for CorruptReason {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::UnknownOpcode(op) => CorruptReason::UnknownOpcode(op),
            RecordError::EgressBeforeIngress {
                t_ingress,
                t_egress,
            } => CorruptReason::EgressBeforeIngress {
                t_ingress,
                t_egress,
            },
        }
    }
}

/// A fatal decoding fault at an absolute byte offset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("corrupt trace at byte {offset} (record {record_index}): {reason}")]
pub struct CorruptTrace {
    /// Absolute offset into the stream, header included.
    pub offset: usize,
    /// Index the faulty record would have had.
    pub record_index: usize,
    pub reason: CorruptReason,
}

/// Strict-mode failure: the fault plus everything decoded before it.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct PartialDecode {
    #[source]
    pub error: CorruptTrace,
    pub prefix: DecodedTrace,
}

// ═══════════════════════════════════════════════════════════════════════
//  Iterator
// ═══════════════════════════════════════════════════════════════════════

/// Lazy record iterator over a trace byte stream.
pub struct TraceDecoder<'a> {
    bytes: &'a [u8],
    cursor: usize,
    index: usize,
    header: Option<FileHeader>,
    pending: Option<CorruptTrace>,
    done: bool,
}

impl<'a> TraceDecoder<'a> {
    /// Create a decoder, detecting and validating an `SNTL` header.
    ///
    /// A malformed header is reported as the first (and only) item.
    pub fn new(bytes: &'a [u8]) -> Self {
        let mut decoder = Self {
            bytes,
            cursor: 0,
            index: 0,
            header: None,
            pending: None,
            done: false,
        };
        if FileHeader::probe(bytes) {
            match FileHeader::parse(bytes) {
                Ok(header) => {
                    decoder.header = Some(header);
                    decoder.cursor = HEADER_SIZE;
                }
                Err(e) => {
                    decoder.pending = Some(CorruptTrace {
                        offset: 0,
                        record_index: 0,
                        reason: CorruptReason::BadHeader(e),
                    });
                }
            }
        }
        decoder
    }

    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.cursor
    }

    fn fail(&mut self, reason: CorruptReason) -> Option<Result<TraceRecord, CorruptTrace>> {
        self.done = true;
        Some(Err(CorruptTrace {
            offset: self.cursor,
            record_index: self.index,
            reason,
        }))
    }
}

impl Iterator for TraceDecoder<'_> {
    type Item = Result<TraceRecord, CorruptTrace>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }

        let remaining = self.bytes.len() - self.cursor;
        if remaining == 0 {
            self.done = true;
            return None;
        }
        if remaining < RECORD_SIZE {
            return self.fail(CorruptReason::Truncated { remaining });
        }

        let mut chunk = [0u8; RECORD_SIZE];
        chunk.copy_from_slice(&self.bytes[self.cursor..self.cursor + RECORD_SIZE]);
        let raw = RawRecord::from_le_bytes(&chunk);
        match TraceRecord::from_raw(&raw) {
            Ok(record) => {
                self.cursor += RECORD_SIZE;
                self.index += 1;
                Some(Ok(record))
            }
            Err(e) => self.fail(e.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Collecting decode
// ═══════════════════════════════════════════════════════════════════════

/// Whether decoding stops with an error or returns the prefix as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    Strict,
    #[default]
    BestEffort,
}

/// Outcome of decoding a whole stream.
#[derive(Debug, Clone, Default)]
pub struct DecodedTrace {
    pub header: Option<FileHeader>,
    pub records: Vec<TraceRecord>,
    /// Set when best-effort decoding stopped early.
    pub corruption: Option<CorruptTrace>,
}

impl DecodedTrace {
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none() && self.count_mismatch().is_none()
    }

    /// `(declared, decoded)` when the header declares a record count that
    /// disagrees with what was decoded.
    pub fn count_mismatch(&self) -> Option<(u64, usize)> {
        let header = self.header.as_ref()?;
        if header.record_count != 0 && header.record_count != self.records.len() as u64 {
            Some((header.record_count, self.records.len()))
        } else {
            None
        }
    }
}

/// Decode a complete byte stream.
pub fn decode(bytes: &[u8], mode: DecodeMode) -> Result<DecodedTrace, PartialDecode> {
    let mut decoder = TraceDecoder::new(bytes);
    let mut records = Vec::with_capacity(bytes.len() / RECORD_SIZE);
    let mut corruption = None;

    for item in decoder.by_ref() {
        match item {
            Ok(record) => records.push(record),
            Err(e) => {
                corruption = Some(e);
                break;
            }
        }
    }

    let trace = DecodedTrace {
        header: decoder.header().copied(),
        records,
        corruption: None,
    };

    if let Some((declared, decoded)) = trace.count_mismatch() {
        warn!("header declares {declared} records, decoded {decoded}");
    }

    match (corruption, mode) {
        (None, _) => {
            debug!("decoded {} records ({} bytes)", trace.records.len(), bytes.len());
            Ok(trace)
        }
        (Some(error), DecodeMode::Strict) => Err(PartialDecode {
            error,
            prefix: trace,
        }),
        (Some(error), DecodeMode::BestEffort) => {
            warn!(
                "best-effort decode kept {} records before fault: {}",
                trace.records.len(),
                error
            );
            Ok(DecodedTrace {
                corruption: Some(error),
                ..trace
            })
        }
    }
}

/// Encode records (optionally behind a header) into the wire format.
pub fn encode(header: Option<&FileHeader>, records: &[TraceRecord]) -> Vec<u8> {
    let header_len = if header.is_some() { HEADER_SIZE } else { 0 };
    let mut out = Vec::with_capacity(header_len + records.len() * RECORD_SIZE);
    if let Some(h) = header {
        out.extend_from_slice(&h.to_bytes());
    }
    for record in records {
        out.extend_from_slice(&record.to_raw().to_le_bytes());
    }
    out
}
