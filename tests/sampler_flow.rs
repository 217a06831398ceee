use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{Local, TimeZone};
use proptest::prelude::*;

use pingchart::history::{History, Sample};
use pingchart::probe::{Probe, ProbeError, SkipReason, SystemPing, Target};
use pingchart::sampler::{start_sampler_thread, Sampler, TickOutcome};

/// Cycles through a fixed list of reports; `None` stands for a failed probe.
struct CycleProbe {
    reports: Vec<Option<String>>,
    next: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: Arc<AtomicUsize>,
}

impl CycleProbe {
    fn new(reports: Vec<Option<String>>) -> Self {
        Self {
            reports,
            next: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Probe for CycleProbe {
    fn run(&self, _target: &Target) -> Result<String, ProbeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(1));
        let idx = self.next.fetch_add(1, Ordering::SeqCst) % self.reports.len();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.reports[idx].clone().ok_or(ProbeError::Exit { code: Some(1) })
    }
}

fn target() -> Target {
    Target::parse("192.0.2.1").unwrap()
}

#[test]
fn bad_output_between_samples_leaves_stats_alone() {
    let probe = CycleProbe::new(vec![
        Some("time=10.0 ms".into()),
        Some("From 192.0.2.1 icmp_seq=1 Destination Host Unreachable".into()),
        Some("time=20.0 ms".into()),
    ]);
    let mut sampler = Sampler::new(probe, target(), 10);

    assert!(matches!(sampler.tick(), TickOutcome::Recorded(_)));
    let stats_before = sampler.stats();
    let len_before = sampler.history().len();

    assert_eq!(sampler.tick(), TickOutcome::Skipped(SkipReason::Unparsed));
    assert_eq!(sampler.history().len(), len_before);
    assert_eq!(sampler.stats(), stats_before);

    sampler.tick();
    assert_eq!(sampler.history().len(), 2);
    assert_eq!(sampler.stats().unwrap().mean, 15.0);
}

#[test]
fn background_thread_publishes_snapshots_one_probe_at_a_time() {
    let probe = CycleProbe::new(vec![Some("time=1.5 ms".into()), None]);
    let max_in_flight = Arc::clone(&probe.max_in_flight);
    let running = Arc::new(AtomicBool::new(true));

    let updates = start_sampler_thread(
        Sampler::new(probe, target(), 4),
        Duration::from_millis(1),
        Arc::clone(&running),
    );

    let mut last = None;
    for _ in 0..10 {
        last = Some(updates.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    running.store(false, Ordering::Relaxed);

    let snap = last.unwrap();
    assert_eq!(snap.ticks, 10);
    assert_eq!(snap.samples.len(), 4);
    assert_eq!(snap.skipped.exit, 5);
    assert_eq!(snap.stats.unwrap().mean, 1.5);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[test]
fn missing_probe_program_is_a_launch_failure() {
    let ping = SystemPing::new("pingchart-no-such-program", Duration::from_secs(1));
    let err = ping.run(&target()).unwrap_err();
    assert_eq!(err.reason(), SkipReason::Launch);

    let mut sampler = Sampler::new(ping, target(), 5);
    assert_eq!(sampler.tick(), TickOutcome::Skipped(SkipReason::Launch));
    assert!(sampler.history().is_empty());
}

#[cfg(unix)]
#[test]
fn non_ping_output_is_unparsed() {
    // `echo -c 1 <target>` exits 0 without any latency in its output
    let mut sampler = Sampler::new(SystemPing::new("echo", Duration::from_secs(5)), target(), 5);
    assert_eq!(sampler.tick(), TickOutcome::Skipped(SkipReason::Unparsed));
}

#[cfg(unix)]
#[test]
fn failing_program_is_an_exit_failure() {
    let ping = SystemPing::new("false", Duration::from_secs(5));
    assert!(matches!(ping.run(&target()), Err(ProbeError::Exit { code: Some(1) })));
}

/// Writes an executable shell script that ignores its arguments.
#[cfg(unix)]
fn fake_ping(dir: &tempfile::TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-ping");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

#[cfg(unix)]
#[test]
fn hung_ping_is_killed_at_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_ping(&dir, "exec sleep 5");
    let ping = SystemPing::new(program, Duration::from_millis(50));

    let started = std::time::Instant::now();
    let result = ping.run(&target());
    assert!(matches!(result, Err(ProbeError::Timeout(_))), "{result:?}");
    assert!(started.elapsed() < Duration::from_secs(2));

    let mut sampler = Sampler::new(ping, target(), 5);
    assert_eq!(sampler.tick(), TickOutcome::Skipped(SkipReason::Timeout));
    assert_eq!(sampler.skipped().timeout, 1);
    assert!(sampler.history().is_empty());
}

#[cfg(unix)]
#[test]
fn output_larger_than_the_pipe_buffer_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_ping(
        &dir,
        "head -c 200000 /dev/zero | tr '\\0' x\necho\necho '64 bytes from 192.0.2.1: time=12.5 ms'",
    );
    let ping = SystemPing::new(program, Duration::from_secs(5));

    let report = ping.run(&target()).unwrap();
    assert!(report.len() > 200_000);

    let mut sampler = Sampler::new(ping, target(), 5);
    assert!(matches!(sampler.tick(), TickOutcome::Recorded(_)));
    assert_eq!(sampler.stats().unwrap().mean, 12.5);
}

proptest! {
    #[test]
    fn window_stays_bounded_and_ordered(
        capacity in 1usize..20,
        latencies in proptest::collection::vec(proptest::option::of(0.0f64..2000.0), 0..80),
    ) {
        let start = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut history = History::new(capacity);
        let mut pushed = Vec::new();

        for (i, latency) in latencies.iter().enumerate() {
            let ts = start + chrono::Duration::seconds(i as i64);
            let sample = match latency {
                Some(ms) => Sample::new(ts, *ms),
                None => Sample::gap(ts),
            };
            history.push(sample);
            pushed.push(sample);
            prop_assert!(history.len() <= capacity);
        }

        let kept: Vec<Sample> = history.to_vec();
        let expected = &pushed[pushed.len().saturating_sub(capacity)..];
        prop_assert_eq!(&kept[..], expected);
        prop_assert!(kept.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let present: Vec<f64> = kept.iter().filter_map(|s| s.latency_ms).collect();
        match history.stats() {
            None => prop_assert!(present.is_empty()),
            Some(stats) => {
                prop_assert!(present.iter().all(|&v| stats.min <= v && v <= stats.max));
                let mean = present.iter().sum::<f64>() / present.len() as f64;
                prop_assert!((stats.mean - mean).abs() < 1e-9);
                prop_assert_eq!(stats.count, present.len());
            }
        }
    }
}
