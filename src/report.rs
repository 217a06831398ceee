use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::Local;

use crate::history::RollingStats;
use crate::probe::Probe;
use crate::sampler::{Sampler, TickOutcome};
use crate::util::{format_clock, format_latency, format_skips};

/// One output line for a tick.
pub fn tick_line(outcome: &TickOutcome, stats: Option<&RollingStats>) -> String {
    match outcome {
        TickOutcome::Recorded(sample) => {
            let mut line = format!(
                "{}  {}",
                format_clock(&sample.timestamp),
                format_latency(sample.latency_ms)
            );
            if let Some(s) = stats {
                line.push_str(&format!(
                    "  min/avg/max {:.2}/{:.2}/{:.2} ms",
                    s.min, s.mean, s.max
                ));
            }
            line
        }
        TickOutcome::Skipped(reason) => {
            format!("{}  skipped ({})", format_clock(&Local::now()), reason.label())
        }
    }
}

// Plain mode: tick on this thread until `running` clears, one line per tick
pub fn run<P: Probe, W: Write>(
    sampler: &mut Sampler<P>,
    interval: Duration,
    running: Arc<AtomicBool>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "PING {} (window {})", sampler.target(), sampler.history().capacity())?;

    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        let outcome = sampler.tick();
        writeln!(out, "{}", tick_line(&outcome, sampler.stats().as_ref()))?;
        out.flush()?;

        let deadline = started + interval;
        // sleep in slices so Ctrl-C is noticed promptly
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }

    writeln!(out, "--- {} ---", sampler.target())?;
    let stats = match sampler.stats() {
        Some(s) => format!("min/avg/max {:.2}/{:.2}/{:.2} ms", s.min, s.mean, s.max),
        None => "no samples".to_string(),
    };
    writeln!(
        out,
        "{} ticks, {} samples in window, {}, {}",
        sampler.ticks(),
        sampler.history().len(),
        format_skips(&sampler.skipped()),
        stats
    )?;
    Ok(())
}
