//! Trace record types shared between the shell RTL and the host decoder.
//!
//! The [`RawRecord`] struct matches the RTL `trace_record_t` packing exactly
//! (32 bytes, little-endian). Higher-level [`TraceRecord`] provides typed
//! access and enforces the `t_egress >= t_ingress` invariant.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Size in bytes of one encoded trace record.
pub const RECORD_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════
//  Raw record (matches RTL packing exactly)
// ═══════════════════════════════════════════════════════════════════════

/// Raw 32-byte record as emitted by the shell's trace port.
///
/// Must match `trace_pkg.sv` and the simulator's `TraceRecord` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub tx_id: u64,
    pub t_ingress: u64,
    pub t_egress: u64,
    pub flags: u16,
    pub opcode: u16,
    pub meta: u32,
}

const _: () = assert!(std::mem::size_of::<RawRecord>() == RECORD_SIZE);

impl RawRecord {
    /// Unpack a record from its little-endian wire form.
    pub fn from_le_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let u64_at = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(word)
        };
        Self {
            tx_id: u64_at(0),
            t_ingress: u64_at(8),
            t_egress: u64_at(16),
            flags: u16::from_le_bytes([bytes[24], bytes[25]]),
            opcode: u16::from_le_bytes([bytes[26], bytes[27]]),
            meta: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
        }
    }

    /// Pack the record into its little-endian wire form.
    pub fn to_le_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..8].copy_from_slice(&self.tx_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.t_ingress.to_le_bytes());
        out[16..24].copy_from_slice(&self.t_egress.to_le_bytes());
        out[24..26].copy_from_slice(&self.flags.to_le_bytes());
        out[26..28].copy_from_slice(&self.opcode.to_le_bytes());
        out[28..32].copy_from_slice(&self.meta.to_le_bytes());
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Flags
// ═══════════════════════════════════════════════════════════════════════

/// Status bitmask carried by every record.
///
/// Unknown bits are preserved so a newer RTL revision never makes an
/// older decoder reject a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct TraceFlags(u16);

impl TraceFlags {
    pub const NONE: Self = Self(0x0000);
    /// A trace was lost because the trace FIFO was full.
    pub const TRACE_DROPPED: Self = Self(0x0001);
    /// The pipeline core reported an error for this transaction.
    pub const CORE_ERROR: Self = Self(0x0002);
    /// Egress seen without a matching ingress.
    pub const INFLIGHT_UNDER: Self = Self(0x0004);
    /// Record was emitted out of tx_id order by the reorder stage.
    pub const REORDER: Self = Self(0x0008);
    /// First record of a new tx_id epoch.
    pub const RESET: Self = Self(0x0010);
    /// The kill switch had latched when this record was emitted.
    pub const KILL_SWITCH: Self = Self(0x0020);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(TraceFlags, &str); 6] = [
            (TraceFlags::TRACE_DROPPED, "DROPPED"),
            (TraceFlags::CORE_ERROR, "ERROR"),
            (TraceFlags::INFLIGHT_UNDER, "UNDERFLOW"),
            (TraceFlags::REORDER, "REORDER"),
            (TraceFlags::RESET, "RESET"),
            (TraceFlags::KILL_SWITCH, "KILL"),
        ];
        if self.0 == 0 {
            return f.write_str("-");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let known = NAMES.iter().fold(0u16, |acc, (flag, _)| acc | flag.0);
        let unknown = self.0 & !known;
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#06x}")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Opcodes
// ═══════════════════════════════════════════════════════════════════════

/// Record kind discriminants matching the RTL `REC_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u16)]
pub enum Opcode {
    /// Normal transaction; the only kind that contributes latency samples.
    TxEvent = 0x01,
    /// FIFO overflow summary; `meta` holds the number of traces lost.
    Overflow = 0x02,
    /// Liveness marker.
    Heartbeat = 0x03,
    /// Cross-clock-domain synchronization marker.
    ClockSync = 0x04,
    /// tx_id epoch boundary.
    Reset = 0x05,
}

impl Opcode {
    /// Every opcode the decoder accepts, in discriminant order.
    pub const ALL: [Opcode; 5] = [
        Opcode::TxEvent,
        Opcode::Overflow,
        Opcode::Heartbeat,
        Opcode::ClockSync,
        Opcode::Reset,
    ];

    /// Convert a `u16` discriminant to an [`Opcode`], if valid.
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x01 => Some(Opcode::TxEvent),
            0x02 => Some(Opcode::Overflow),
            0x03 => Some(Opcode::Heartbeat),
            0x04 => Some(Opcode::ClockSync),
            0x05 => Some(Opcode::Reset),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::TxEvent => "TX_EVENT",
            Opcode::Overflow => "OVERFLOW",
            Opcode::Heartbeat => "HEARTBEAT",
            Opcode::ClockSync => "CLOCK_SYNC",
            Opcode::Reset => "RESET",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Typed record
// ═══════════════════════════════════════════════════════════════════════

/// Why a raw record could not become a [`TraceRecord`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("t_egress {t_egress} precedes t_ingress {t_ingress}")]
    EgressBeforeIngress { t_ingress: u64, t_egress: u64 },
}

/// One observed transaction through the shell.
///
/// Fields are private: a `TraceRecord` can only be built through
/// [`TraceRecord::from_raw`] or [`TraceRecord::new`], both of which reject
/// `t_egress < t_ingress`, so [`TraceRecord::latency_cycles`] never wraps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    tx_id: u64,
    t_ingress: u64,
    t_egress: u64,
    flags: TraceFlags,
    opcode: Opcode,
    meta: u32,
}

impl TraceRecord {
    pub fn new(
        tx_id: u64,
        t_ingress: u64,
        t_egress: u64,
        flags: TraceFlags,
        opcode: Opcode,
        meta: u32,
    ) -> Result<Self, RecordError> {
        if t_egress < t_ingress {
            return Err(RecordError::EgressBeforeIngress {
                t_ingress,
                t_egress,
            });
        }
        Ok(Self {
            tx_id,
            t_ingress,
            t_egress,
            flags,
            opcode,
            meta,
        })
    }

    /// Parse a [`RawRecord`] into a typed [`TraceRecord`].
    pub fn from_raw(raw: &RawRecord) -> Result<Self, RecordError> {
        let opcode = Opcode::from_u16(raw.opcode).ok_or(RecordError::UnknownOpcode(raw.opcode))?;
        Self::new(
            raw.tx_id,
            raw.t_ingress,
            raw.t_egress,
            TraceFlags::from_bits(raw.flags),
            opcode,
            raw.meta,
        )
    }

    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            tx_id: self.tx_id,
            t_ingress: self.t_ingress,
            t_egress: self.t_egress,
            flags: self.flags.bits(),
            opcode: self.opcode as u16,
            meta: self.meta,
        }
    }

    pub fn tx_id(&self) -> u64 {
        self.tx_id
    }

    pub fn t_ingress(&self) -> u64 {
        self.t_ingress
    }

    pub fn t_egress(&self) -> u64 {
        self.t_egress
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Opaque payload, passed through unmodified.
    pub fn meta(&self) -> u32 {
        self.meta
    }

    /// Latency in clock cycles. Always derived, never stored.
    pub fn latency_cycles(&self) -> u64 {
        self.t_egress - self.t_ingress
    }

    pub fn is_transaction(&self) -> bool {
        self.opcode == Opcode::TxEvent
    }

    /// Whether this record opens a new tx_id epoch.
    pub fn is_reset(&self) -> bool {
        self.opcode == Opcode::Reset || self.flags.contains(TraceFlags::RESET)
    }

    pub fn has_error(&self) -> bool {
        self.flags.contains(TraceFlags::CORE_ERROR)
    }

    pub fn trace_dropped(&self) -> bool {
        self.flags.contains(TraceFlags::TRACE_DROPPED)
    }

    pub fn inflight_underflow(&self) -> bool {
        self.flags.contains(TraceFlags::INFLIGHT_UNDER)
    }

    pub fn kill_switch(&self) -> bool {
        self.flags.contains(TraceFlags::KILL_SWITCH)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Display
// ═══════════════════════════════════════════════════════════════════════

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8}] {:<10} in={:<10} out={:<10} lat={:<6} flags={} meta={:#x}",
            self.tx_id,
            self.opcode.name(),
            self.t_ingress,
            self.t_egress,
            self.latency_cycles(),
            self.flags,
            self.meta,
        )
    }
}
