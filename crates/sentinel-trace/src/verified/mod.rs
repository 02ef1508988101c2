//! Verified pure functions for the trace pipeline.
//!
//! This module contains pure, deterministic functions extracted from the
//! effectful metrics, sequence and verifier modules. Each sub-module
//! contains only functions with **no I/O and no external state mutation**,
//! guarded by `debug_assert!` pre- and postconditions.
//!
//! Keeping the order-statistic and sequence-transition cores here gives a
//! clear boundary between checked logic and the shell around it, and lets
//! the cores be exercised exhaustively with plain `#[test]`s.

pub mod metrics;
pub mod sequence;
pub mod verifier;
