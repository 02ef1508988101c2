//! In-process stand-in for the RTL simulator, used by the runner tests.
//!
//! Transactions are issued every [`ISSUE_INTERVAL`] cycles with a
//! seed-dependent latency and `meta`. Each fault type perturbs the stream
//! the way the shell's injector does:
//!
//! | Fault          | Effect on the synthesized run                           |
//! |----------------|---------------------------------------------------------|
//! | backpressure   | latency x3 while active                                 |
//! | fifo overflow  | every odd tx_id loses its trace record                  |
//! | burst          | `parameter` extra transactions spread over the window;  |
//! |                | combined with backpressure, odd tx_ids lose traces      |
//! | reorder        | chunks of `parameter + 1` records emitted reversed      |
//! | reset          | RESET record, tx_ids restart at 0                       |
//! | kill switch    | KILL_SWITCH heartbeat, no further transactions          |
//! | clock stretch  | latency x`parameter`                                    |
//! | corrupt data   | `meta ^= parameter`, CORE_ERROR flag                    |

use crate::faults::{FaultConfig, FaultType};
use crate::program::FaultProgram;
use crate::simulator::{
    CancelToken, SimulationFailure, SimulationOutput, SimulationRequest, Simulator,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sentinel_trace::counters::SimCounters;
use sentinel_trace::decode::encode;
use sentinel_trace::header::FileHeader;
use sentinel_trace::record::{Opcode, TraceFlags, TraceRecord};

pub(crate) const ISSUE_INTERVAL: u64 = 4;
const BASE_LATENCY: u64 = 10;

#[derive(Debug, Default)]
pub(crate) struct SyntheticSimulator;

impl Simulator for SyntheticSimulator {
    fn run(
        &self,
        request: &SimulationRequest,
        cancel: &CancelToken,
    ) -> Result<SimulationOutput, SimulationFailure> {
        if cancel.is_cancelled() {
            return Err(SimulationFailure::Cancelled);
        }
        let output = synthesize(&request.program);
        std::fs::write(request.trace_path(), &output.trace)?;
        Ok(output)
    }
}

fn record(id: u64, t_in: u64, t_out: u64, flags: TraceFlags, opcode: Opcode, meta: u32) -> TraceRecord {
    TraceRecord::new(id, t_in, t_out, flags, opcode, meta).expect("synthesized record is valid")
}

fn flush_reversed(buf: &mut Vec<TraceRecord>, out: &mut Vec<TraceRecord>) {
    out.extend(buf.drain(..).rev());
}

pub(crate) fn synthesize(program: &FaultProgram) -> SimulationOutput {
    let faults = program.faults();
    let active = |ty: FaultType, cycle: u64| -> Option<&FaultConfig> {
        faults
            .iter()
            .find(|f| f.fault_type == ty && f.active_window().contains(cycle))
    };

    let mut issues: Vec<u64> = (0..program.num_tx()).map(|i| i * ISSUE_INTERVAL).collect();
    for burst in faults.iter().filter(|f| f.fault_type == FaultType::Burst) {
        let extra = burst.parameter;
        let span = burst.duration_cycles.max(1);
        issues.extend((0..extra).map(|k| burst.trigger_cycle + k * span / extra.max(1)));
    }
    issues.sort_unstable();

    let mut resets: Vec<u64> = faults
        .iter()
        .filter(|f| f.fault_type == FaultType::Reset)
        .map(|f| f.trigger_cycle)
        .collect();
    resets.sort_unstable_by(|a, b| b.cmp(a));

    let mut rng = ChaCha8Rng::seed_from_u64(program.seed());
    let mut records = Vec::new();
    let mut reorder_buf = Vec::new();
    let mut counters = SimCounters {
        transactions_sent: Some(0),
        transactions_received: Some(0),
        trace_drops: Some(0),
        in_backpressure_cycles: Some(0),
        out_backpressure_cycles: Some(0),
        inflight_underflows: Some(0),
        trace_overflow_seen: Some(false),
        kill_switch_triggered: Some(false),
        ..SimCounters::default()
    };
    let mut next_id = 0u64;
    let mut lost = 0u32;

    for cycle in issues {
        while resets.last().is_some_and(|&t| t <= cycle) {
            let t = resets.pop().unwrap_or(cycle);
            flush_reversed(&mut reorder_buf, &mut records);
            records.push(record(0, t, t, TraceFlags::RESET, Opcode::Reset, 0));
            next_id = 0;
        }
        if let Some(kill) = active(FaultType::KillSwitch, cycle) {
            flush_reversed(&mut reorder_buf, &mut records);
            let t = kill.trigger_cycle;
            records.push(record(0, t, t, TraceFlags::KILL_SWITCH, Opcode::Heartbeat, 0));
            counters.kill_switch_triggered = Some(true);
            break;
        }

        let id = next_id;
        next_id += 1;
        *counters.transactions_sent.get_or_insert(0) += 1;
        *counters.transactions_received.get_or_insert(0) += 1;

        let mut latency = BASE_LATENCY + rng.gen_range(0..4);
        let mut flags = TraceFlags::NONE;
        let mut meta: u32 = rng.gen();
        let backpressure = active(FaultType::Backpressure, cycle).is_some();
        if backpressure {
            latency *= 3;
            *counters.in_backpressure_cycles.get_or_insert(0) += ISSUE_INTERVAL;
        }
        if let Some(stretch) = active(FaultType::ClockStretch, cycle) {
            latency *= stretch.parameter.max(1);
        }
        if let Some(corrupt) = active(FaultType::CorruptData, cycle) {
            meta ^= corrupt.parameter as u32;
            flags = flags | TraceFlags::CORE_ERROR;
        }

        let overflow = active(FaultType::FifoOverflow, cycle).is_some();
        let congested = backpressure && active(FaultType::Burst, cycle).is_some();
        if (overflow || congested) && id % 2 == 1 {
            *counters.trace_drops.get_or_insert(0) += 1;
            counters.trace_overflow_seen = Some(true);
            lost += 1;
            continue;
        }

        match active(FaultType::Reorder, cycle) {
            Some(reorder) => {
                let rec = record(id, cycle, cycle + latency, flags | TraceFlags::REORDER, Opcode::TxEvent, meta);
                reorder_buf.push(rec);
                if reorder_buf.len() as u64 > reorder.parameter {
                    flush_reversed(&mut reorder_buf, &mut records);
                }
            }
            None => {
                flush_reversed(&mut reorder_buf, &mut records);
                records.push(record(id, cycle, cycle + latency, flags, Opcode::TxEvent, meta));
            }
        }
    }
    flush_reversed(&mut reorder_buf, &mut records);

    let end = records.iter().map(TraceRecord::t_egress).max().unwrap_or(0);
    if lost > 0 {
        records.push(record(0, end, end, TraceFlags::TRACE_DROPPED, Opcode::Overflow, lost));
    }
    counters.cycles_run = Some(end + 1);

    let header = FileHeader {
        run_id: program.seed() as u32,
        record_count: records.len() as u64,
        ..FileHeader::default()
    };
    SimulationOutput {
        trace: encode(Some(&header), &records),
        stdout: format!("=== Simulation Complete ===\n{}", counters.render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::FaultProgramBuilder;
    use sentinel_trace::decode::{decode, DecodeMode};

    #[test]
    fn clean_run_is_in_order() {
        let program = FaultProgramBuilder::new().transactions(100).seed(1).build();
        let out = synthesize(&program);
        let trace = decode(&out.trace, DecodeMode::Strict).unwrap();
        assert_eq!(trace.records.len(), 100);
        assert!(trace.is_clean());
        assert!(trace
            .records
            .iter()
            .enumerate()
            .all(|(i, r)| r.tx_id() == i as u64));
        let counters = SimCounters::parse(&out.stdout);
        assert_eq!(counters.transactions_received, Some(100));
        assert_eq!(counters.trace_drops, Some(0));
    }

    #[test]
    fn same_seed_same_bytes() {
        let program = FaultProgramBuilder::new().transactions(500).seed(9).build();
        assert_eq!(synthesize(&program).trace, synthesize(&program).trace);
        let other = FaultProgramBuilder::new().transactions(500).seed(10).build();
        assert_ne!(synthesize(&program).trace, synthesize(&other).trace);
    }
}
