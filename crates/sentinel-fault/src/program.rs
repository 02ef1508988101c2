//! Fault programs: the plusarg list handed to the simulator.
//!
//! A [`FaultProgram`] is the complete wire-level description of one run:
//! the ordered fault slots, the stimulus size, the seed and where the
//! trace should be written. Programs can be built declaratively with
//! [`FaultProgramBuilder`] or parsed back from an argument list for
//! diagnostics.

use crate::faults::{FaultConfig, FaultType};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SEED: u64 = 0xDEAD_BEEF;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("malformed plusarg {0:?}")]
    Malformed(String),

    #[error("plusarg {arg:?} has non-numeric value")]
    BadNumber { arg: String },

    #[error("unknown fault type id {0}")]
    UnknownFaultType(u64),

    #[error("fault slot {index} is missing +fault{index}_{field}")]
    MissingField { index: usize, field: &'static str },

    #[error("fault slots are not contiguous: slot {0} missing")]
    SlotGap(usize),
}

/// Ordered fault slots plus run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultProgram {
    faults: Vec<FaultConfig>,
    num_tx: u64,
    seed: u64,
    trace_file: Option<PathBuf>,
}

impl FaultProgram {
    pub fn faults(&self) -> &[FaultConfig] {
        &self.faults
    }

    pub fn num_tx(&self) -> u64 {
        self.num_tx
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn trace_file(&self) -> Option<&PathBuf> {
        self.trace_file.as_ref()
    }

    /// Same program writing its trace to `path`.
    pub fn with_trace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_file = Some(path.into());
        self
    }

    /// Simulator arguments, fault slots numbered from 0 in declaration order.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .faults
            .iter()
            .enumerate()
            .flat_map(|(i, f)| f.to_wire(i))
            .collect();
        args.push(format!("+num_tx={}", self.num_tx));
        args.push(format!("+seed={}", self.seed));
        if let Some(ref path) = self.trace_file {
            args.push(format!("+trace_file={}", path.display()));
        }
        args
    }

    /// Parse a plusarg list. Arguments that are not plusargs are ignored.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ProgramError> {
        #[derive(Default)]
        struct Slot {
            ty: Option<u64>,
            trigger: Option<u64>,
            duration: Option<u64>,
            param: Option<u64>,
        }

        let mut slots: BTreeMap<usize, Slot> = BTreeMap::new();
        let mut builder = FaultProgramBuilder::new();

        for arg in args {
            let arg = arg.as_ref();
            let Some(body) = arg.strip_prefix('+') else {
                continue;
            };
            let (key, value) = body
                .split_once('=')
                .ok_or_else(|| ProgramError::Malformed(arg.to_string()))?;

            if key == "trace_file" {
                builder = builder.trace_file(value);
                continue;
            }
            let number = || {
                value.parse::<u64>().map_err(|_| ProgramError::BadNumber {
                    arg: arg.to_string(),
                })
            };
            match key {
                "num_tx" => builder = builder.transactions(number()?),
                "seed" => builder = builder.seed(number()?),
                _ => {
                    let Some(rest) = key.strip_prefix("fault") else {
                        continue;
                    };
                    let (index, field) = rest
                        .split_once('_')
                        .ok_or_else(|| ProgramError::Malformed(arg.to_string()))?;
                    let index: usize = index
                        .parse()
                        .map_err(|_| ProgramError::Malformed(arg.to_string()))?;
                    let slot = slots.entry(index).or_default();
                    match field {
                        "type" => slot.ty = Some(number()?),
                        "trigger" => slot.trigger = Some(number()?),
                        "duration" => slot.duration = Some(number()?),
                        "param" => slot.param = Some(number()?),
                        _ => return Err(ProgramError::Malformed(arg.to_string())),
                    }
                }
            }
        }

        for (expected, (&index, slot)) in slots.iter().enumerate() {
            if index != expected {
                return Err(ProgramError::SlotGap(expected));
            }
            let missing = |field| ProgramError::MissingField { index, field };
            let ty = slot.ty.ok_or_else(|| missing("type"))?;
            let fault_type = FaultType::from_wire_id(ty).ok_or(ProgramError::UnknownFaultType(ty))?;
            let trigger = slot.trigger.ok_or_else(|| missing("trigger"))?;
            builder = builder.fault(
                FaultConfig::new(fault_type, trigger)
                    .lasting(slot.duration.ok_or_else(|| missing("duration"))?)
                    .with_parameter(slot.param.ok_or_else(|| missing("param"))?),
            );
        }

        Ok(builder.build())
    }
}

/// Builder for constructing fault programs declaratively.
///
/// # Example
///
/// ```
/// use sentinel_fault::faults::{FaultConfig, FaultType};
/// use sentinel_fault::program::FaultProgramBuilder;
///
/// let program = FaultProgramBuilder::new()
///     .fault(FaultConfig::new(FaultType::Backpressure, 1000).lasting(500))
///     .fault(FaultConfig::new(FaultType::Burst, 1200).lasting(300).with_parameter(100))
///     .transactions(10_000)
///     .build();
///
/// assert_eq!(program.faults().len(), 2);
/// assert_eq!(program.args()[0], "+fault0_type=1");
/// ```
pub struct FaultProgramBuilder {
    program: FaultProgram,
}

impl FaultProgramBuilder {
    pub fn new() -> Self {
        Self {
            program: FaultProgram {
                faults: Vec::new(),
                num_tx: 10_000,
                seed: DEFAULT_SEED,
                trace_file: None,
            },
        }
    }

    /// Append a fault in the next slot.
    pub fn fault(mut self, fault: FaultConfig) -> Self {
        self.program.faults.push(fault);
        self
    }

    pub fn faults(mut self, faults: impl IntoIterator<Item = FaultConfig>) -> Self {
        self.program.faults.extend(faults);
        self
    }

    pub fn transactions(mut self, num_tx: u64) -> Self {
        self.program.num_tx = num_tx;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.program.seed = seed;
        self
    }

    pub fn trace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.program.trace_file = Some(path.into());
        self
    }

    pub fn build(self) -> FaultProgram {
        self.program
    }
}

impl Default for FaultProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
