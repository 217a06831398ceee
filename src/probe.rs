use std::{
    fmt,
    io::{self, Read},
    process::{Command, Stdio},
    str::FromStr,
    sync::{
        mpsc::{self, RecvTimeoutError},
        OnceLock,
    },
    thread,
    time::{Duration, Instant},
};

use regex::Regex;
use thiserror::Error;

use crate::constants::PROBE_WAIT_STEP_MS;

/// Host name or address handed to the probe. Only non-emptiness is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("probe target must not be empty")]
    Empty,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("probe i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe exited with status {}", exit_label(.code))]
    Exit { code: Option<i32> },
    #[error("no latency found in probe output")]
    NoLatency,
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Why a tick produced no latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Launch,
    Timeout,
    Exit,
    Unparsed,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::Launch => "launch failed",
            SkipReason::Timeout => "timeout",
            SkipReason::Exit => "unreachable",
            SkipReason::Unparsed => "no latency",
        }
    }
}

impl ProbeError {
    pub fn reason(&self) -> SkipReason {
        match self {
            ProbeError::Launch { .. } | ProbeError::Io(_) => SkipReason::Launch,
            ProbeError::Timeout(_) => SkipReason::Timeout,
            ProbeError::Exit { .. } => SkipReason::Exit,
            ProbeError::NoLatency => SkipReason::Unparsed,
        }
    }
}

/// One round trip against a target, returning the textual report.
pub trait Probe {
    fn run(&self, target: &Target) -> Result<String, ProbeError>;
}

/// The platform `ping` utility, one echo per run.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
    timeout: Duration,
}

impl SystemPing {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn count_flag() -> &'static str {
        if cfg!(windows) {
            "-n"
        } else {
            "-c"
        }
    }
}

impl Probe for SystemPing {
    fn run(&self, target: &Target) -> Result<String, ProbeError> {
        let mut child = Command::new(&self.program)
            .arg(Self::count_flag())
            .arg("1")
            .arg(target.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProbeError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // drain stdout concurrently so a chatty child never blocks on a full pipe
        let stdout = child.stdout.take();
        let (report_tx, report_rx) = mpsc::channel();
        thread::spawn(move || {
            let mut report = String::new();
            let res = match stdout {
                Some(mut out) => out.read_to_string(&mut report).map(|_| report),
                None => Ok(report),
            };
            let _ = report_tx.send(res);
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // already-exited races are fine here
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Timeout(self.timeout));
            }
            thread::sleep(Duration::from_millis(PROBE_WAIT_STEP_MS));
        };

        // a leftover grandchild can hold the pipe open past exit
        let remaining = deadline.saturating_duration_since(Instant::now());
        let report = match report_rx.recv_timeout(remaining) {
            Ok(res) => res?,
            Err(RecvTimeoutError::Timeout) => return Err(ProbeError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ProbeError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "probe output reader exited early",
                )))
            }
        };

        if !status.success() {
            return Err(ProbeError::Exit {
                code: status.code(),
            });
        }
        Ok(report)
    }
}

#[allow(clippy::expect_used)]
fn latency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"time=(\d+(?:\.\d+)?)").expect("static latency pattern"))
}

/// Extracts the round-trip time in milliseconds from a ping report.
pub fn parse_latency(report: &str) -> Option<f64> {
    latency_pattern()
        .captures(report)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
