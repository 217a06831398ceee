use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::history::{nearest_sample, History, RollingStats, Sample};
use crate::probe::{parse_latency, Probe, ProbeError, SkipReason, Target};

/// Skipped-tick counts, split by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounters {
    pub launch: u64,
    pub timeout: u64,
    pub exit: u64,
    pub unparsed: u64,
}

impl SkipCounters {
    pub fn bump(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Launch => self.launch += 1,
            SkipReason::Timeout => self.timeout += 1,
            SkipReason::Exit => self.exit += 1,
            SkipReason::Unparsed => self.unparsed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.launch + self.timeout + self.exit + self.unparsed
    }
}

/// What a single tick did to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Recorded(Sample),
    Skipped(SkipReason),
}

/// Read-only copy of the sampler state, handed to presenters after each tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub samples: Vec<Sample>,
    pub capacity: usize,
    pub stats: Option<RollingStats>,
    pub skipped: SkipCounters,
    pub ticks: u64,
    pub last_skip: Option<SkipReason>,
}

impl Snapshot {
    pub fn empty(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            capacity,
            stats: None,
            skipped: SkipCounters::default(),
            ticks: 0,
            last_skip: None,
        }
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn nearest(&self, x: f64, y: f64) -> Option<(usize, &Sample)> {
        nearest_sample(&self.samples, x, y)
    }
}

/// Owns the probe and the bounded latency window for one target.
pub struct Sampler<P> {
    probe: P,
    target: Target,
    history: History,
    stats: Option<RollingStats>,
    skipped: SkipCounters,
    ticks: u64,
    last_skip: Option<SkipReason>,
    record_gaps: bool,
}

impl<P: Probe> Sampler<P> {
    pub fn new(probe: P, target: Target, capacity: usize) -> Self {
        Self {
            probe,
            target,
            history: History::new(capacity),
            stats: None,
            skipped: SkipCounters::default(),
            ticks: 0,
            last_skip: None,
            record_gaps: false,
        }
    }

    /// Failed ticks append a latency-less sample instead of being dropped.
    pub fn record_gaps(mut self, enabled: bool) -> Self {
        self.record_gaps = enabled;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn stats(&self) -> Option<RollingStats> {
        self.stats
    }

    pub fn skipped(&self) -> SkipCounters {
        self.skipped
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one probe and turns its report into a timestamped sample.
    pub fn poll(&self) -> Result<Sample, ProbeError> {
        let report = self.probe.run(&self.target)?;
        let latency = parse_latency(&report).ok_or(ProbeError::NoLatency)?;
        Ok(Sample::new(Local::now(), latency))
    }

    pub fn record(&mut self, mut sample: Sample) {
        // keep timestamps non-decreasing across wall-clock steps
        if let Some(last) = self.history.latest() {
            if sample.timestamp < last.timestamp {
                sample.timestamp = last.timestamp;
            }
        }
        self.history.push(sample);
        self.stats = self.history.stats();
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        match self.poll() {
            Ok(sample) => {
                debug!(host = %self.target, latency_ms = ?sample.latency_ms, "sample recorded");
                self.record(sample);
                self.last_skip = None;
                TickOutcome::Recorded(sample)
            }
            Err(err) => {
                let reason = err.reason();
                warn!(host = %self.target, error = %err, "tick skipped");
                self.skipped.bump(reason);
                self.last_skip = Some(reason);
                if self.record_gaps {
                    self.record(Sample::gap(Local::now()));
                }
                TickOutcome::Skipped(reason)
            }
        }
    }

    pub fn nearest(&self, x: f64, y: f64) -> Option<(usize, &Sample)> {
        self.history.nearest(x, y)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            samples: self.history.to_vec(),
            capacity: self.history.capacity(),
            stats: self.stats,
            skipped: self.skipped,
            ticks: self.ticks,
            last_skip: self.last_skip,
        }
    }
}

// Start a background sampling thread. Ticks run back to back on this one
// thread, so there is never more than one probe in flight.
pub fn start_sampler_thread<P>(
    mut sampler: Sampler<P>,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> Receiver<Snapshot>
where
    P: Probe + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        info!(host = %sampler.target(), interval_ms = interval.as_millis() as u64, "sampler started");
        while running.load(Ordering::Relaxed) {
            let started = Instant::now();
            sampler.tick();
            if tx.send(sampler.snapshot()).is_err() {
                break;
            }
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        debug!("sampler stopped");
    });

    rx
}
