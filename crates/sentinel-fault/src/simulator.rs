//! The boundary to the cycle-accurate simulator.
//!
//! The simulator is an external process: it takes a fault program as
//! plusargs, writes a binary trace to `+trace_file=` and prints counter
//! lines on stdout. [`Simulator`] abstracts that so the runner can be
//! driven by a real [`ProcessSimulator`] or by an in-process stand-in.
//!
//! ```text
//!   FaultProgram ──args──▶ ┌──────────────┐ ──trace.bin──▶ SimulationOutput.trace
//!                          │  simulator   │ ──stdout────▶ SimulationOutput.stdout
//!   CancelToken ──kill───▶ └──────────────┘
//! ```

use crate::config::HarnessConfig;
use crate::program::FaultProgram;
use log::{debug, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const STDOUT_FILE: &str = "simulator.stdout";
const STDERR_FILE: &str = "simulator.stderr";
const STDERR_TAIL_LINES: usize = 20;

/// Why a simulator invocation produced no usable output.
#[derive(Error, Debug)]
pub enum SimulationFailure {
    #[error("failed to spawn {}: {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("simulator exited with {}: {stderr_tail}", .code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    NonZeroExit {
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("simulator timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("simulation cancelled")]
    Cancelled,

    #[error("simulator produced no trace at {}", .0.display())]
    MissingTrace(PathBuf),

    #[error("simulator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared flag for abandoning in-flight runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One invocation: the program (with its trace path set) and where to run.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub scenario: String,
    pub program: FaultProgram,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

impl SimulationRequest {
    /// Trace location: the program's `+trace_file`, else `trace.bin` in the work dir.
    pub fn trace_path(&self) -> PathBuf {
        self.program
            .trace_file()
            .cloned()
            .unwrap_or_else(|| self.work_dir.join("trace.bin"))
    }
}

/// What a successful invocation returns.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutput {
    /// Raw trace bytes, exactly as written.
    pub trace: Vec<u8>,
    /// Counter report text.
    pub stdout: String,
}

/// Anything that can turn a fault program into a trace.
pub trait Simulator: Send + Sync {
    fn run(
        &self,
        request: &SimulationRequest,
        cancel: &CancelToken,
    ) -> Result<SimulationOutput, SimulationFailure>;
}

// ═══════════════════════════════════════════════════════════════════════
//  External process
// ═══════════════════════════════════════════════════════════════════════

/// Runs a simulator executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessSimulator {
    executable: PathBuf,
    /// Arguments placed before the fault program.
    args: Vec<String>,
    poll_interval: Duration,
}

impl ProcessSimulator {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Simulator described by a harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.simulator).with_args(config.simulator_args.iter().cloned())
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Wait for exit, killing the child on timeout or cancellation.
    fn wait(
        &self,
        child: &mut std::process::Child,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<std::process::ExitStatus, SimulationFailure> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            let failure = if cancel.is_cancelled() {
                Some(SimulationFailure::Cancelled)
            } else if started.elapsed() >= timeout {
                Some(SimulationFailure::Timeout {
                    after: started.elapsed(),
                })
            } else {
                None
            };
            if let Some(failure) = failure {
                let _ = child.kill();
                child.wait()?;
                return Err(failure);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl Simulator for ProcessSimulator {
    fn run(
        &self,
        request: &SimulationRequest,
        cancel: &CancelToken,
    ) -> Result<SimulationOutput, SimulationFailure> {
        if cancel.is_cancelled() {
            return Err(SimulationFailure::Cancelled);
        }

        let trace_path = request.trace_path();
        let program = request.program.clone().with_trace_file(&trace_path);
        let stdout_path = request.work_dir.join(STDOUT_FILE);
        let stderr_path = request.work_dir.join(STDERR_FILE);

        debug!(
            "[{}] spawning {} {:?}",
            request.scenario,
            self.executable.display(),
            program.args()
        );

        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .args(program.args())
            .current_dir(&request.work_dir)
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?)
            .spawn()
            .map_err(|source| SimulationFailure::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        let status = self.wait(&mut child, request.timeout, cancel)?;
        let stdout = String::from_utf8_lossy(&std::fs::read(&stdout_path)?).into_owned();

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            let stderr_tail = tail(&stderr, STDERR_TAIL_LINES);
            warn!("[{}] simulator failed: {}", request.scenario, stderr_tail);
            return Err(SimulationFailure::NonZeroExit {
                code: status.code(),
                stderr_tail,
            });
        }

        let trace = match std::fs::read(&trace_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SimulationFailure::MissingTrace(trace_path));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            "[{}] simulator wrote {} trace bytes",
            request.scenario,
            trace.len()
        );
        Ok(SimulationOutput { trace, stdout })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::program::FaultProgramBuilder;
    use tempfile::TempDir;

    /// Shell script that writes its trace to the `+trace_file=` plusarg.
    const WRITES_TRACE: &str = r#"
for a in "$@"; do
  case "$a" in
    +trace_file=*) f="${a#+trace_file=}" ;;
  esac
done
printf 'SNTLtrace' > "$f"
echo "Transactions received: 3"
echo "Trace drops: 0"
"#;

    fn sim(dir: &TempDir, body: &str) -> ProcessSimulator {
        let script = dir.path().join("sim.sh");
        std::fs::write(&script, body).unwrap();
        ProcessSimulator::new("/bin/sh")
            .with_args([script.display().to_string()])
            .with_poll_interval(Duration::from_millis(5))
    }

    fn request(dir: &TempDir, timeout: Duration) -> SimulationRequest {
        let work_dir = dir.path().join("work");
        std::fs::create_dir(&work_dir).unwrap();
        SimulationRequest {
            scenario: "test".into(),
            program: FaultProgramBuilder::new().transactions(3).build(),
            work_dir,
            timeout,
        }
    }

    #[test]
    fn successful_run_returns_trace_and_stdout() {
        let dir = TempDir::new().unwrap();
        let out = sim(&dir, WRITES_TRACE)
            .run(&request(&dir, Duration::from_secs(10)), &CancelToken::new())
            .unwrap();
        assert_eq!(out.trace, b"SNTLtrace");
        assert!(out.stdout.contains("Trace drops: 0"));
    }

    #[test]
    fn non_zero_exit_carries_stderr_tail() {
        let dir = TempDir::new().unwrap();
        let err = sim(&dir, "echo 'assertion failed in tb' >&2\nexit 3\n")
            .run(&request(&dir, Duration::from_secs(10)), &CancelToken::new())
            .unwrap_err();
        match err {
            SimulationFailure::NonZeroExit { code, stderr_tail } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr_tail, "assertion failed in tb");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timeout_kills_child() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let err = sim(&dir, "sleep 30\n")
            .run(&request(&dir, Duration::from_millis(100)), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, SimulationFailure::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = sim(&dir, WRITES_TRACE)
            .run(&request(&dir, Duration::from_secs(10)), &cancel)
            .unwrap_err();
        assert!(matches!(err, SimulationFailure::Cancelled));
    }

    #[test]
    fn missing_trace_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let err = sim(&dir, "echo 'Trace drops: 0'\n")
            .run(&request(&dir, Duration::from_secs(10)), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, SimulationFailure::MissingTrace(_)));
    }

    #[test]
    fn spawn_failure_names_executable() {
        let dir = TempDir::new().unwrap();
        let err = ProcessSimulator::new(dir.path().join("does-not-exist"))
            .run(&request(&dir, Duration::from_secs(1)), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, SimulationFailure::Spawn { .. }));
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }
}
