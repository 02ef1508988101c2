//! Trace decoding and reconciliation for the Sentinel latency shell.
//!
//! The shell wraps a latency-sensitive pipeline core and emits one 32-byte
//! record per observed transaction. This crate turns that byte stream into
//! typed records and derives everything the fault harness needs from it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Simulator / RTL trace port          │
//! │  (32-byte LE records, opt. header)  │
//! └──────────────┬──────────────────────┘
//!                │ raw bytes
//! ┌──────────────▼──────────────────────┐
//! │  decode::TraceDecoder               │
//! │    → TraceRecord stream             │
//! │    → CorruptTrace (offset, reason)  │
//! └──────┬───────────────┬──────────────┘
//!        │               │
//! ┌──────▼───────┐ ┌─────▼──────────────┐   ┌──────────────────┐
//! │ metrics      │ │ sequence           │◀──│ counters         │
//! │ LatencyMetr. │ │ SequenceTracker    │   │ SimCounters      │
//! └──────────────┘ └────────────────────┘   └──────────────────┘
//!                        verifier::DeterminismVerifier (sha256)
//! ```
//!
//! # Usage
//!
//! ```
//! use sentinel_trace::decode::{decode, encode, DecodeMode};
//! use sentinel_trace::metrics::compute_transaction_metrics;
//! use sentinel_trace::record::{Opcode, TraceFlags, TraceRecord};
//! use sentinel_trace::sequence::SequenceTracker;
//!
//! let records: Vec<_> = (0..10)
//!     .map(|i| TraceRecord::new(i, i * 8, i * 8 + 5, TraceFlags::NONE, Opcode::TxEvent, 0).unwrap())
//!     .collect();
//! let bytes = encode(None, &records);
//!
//! let trace = decode(&bytes, DecodeMode::Strict).unwrap();
//! let metrics = compute_transaction_metrics(&trace.records).unwrap();
//! assert_eq!(metrics.p99_cycles, 5);
//!
//! let summary = SequenceTracker::track_all(0, &trace.records);
//! assert_eq!(summary.dropped, 0);
//! ```

pub mod counters;
pub mod decode;
pub mod header;
pub mod metrics;
pub mod record;
pub mod sequence;
pub mod verified;
pub mod verifier;

pub use counters::SimCounters;
pub use decode::{decode, CorruptTrace, DecodeMode, DecodedTrace, TraceDecoder};
pub use metrics::{compute_transaction_metrics, LatencyMetrics, MetricsError};
pub use record::{Opcode, TraceFlags, TraceRecord, RECORD_SIZE};
pub use sequence::{SequenceSummary, SequenceTracker};
