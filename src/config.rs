use std::{path::PathBuf, time::Duration};

use clap::{builder::RangedU64ValueParser, Parser};

use crate::constants::{
    DEFAULT_PING_PROGRAM, DEFAULT_WINDOW, MAX_WINDOW, PROBE_TIMEOUT_MS, TICK_RATE_MS,
};
use crate::probe::Target;

/// Live round-trip latency chart for a single host.
#[derive(Debug, Parser)]
#[command(name = "pingchart", version, about)]
pub struct Args {
    /// Host name or IP address to ping
    pub target: Target,

    /// Number of samples kept in the sliding window
    #[arg(
        long,
        default_value_t = DEFAULT_WINDOW,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_WINDOW as u64)
    )]
    pub window: usize,

    /// Milliseconds between probes
    #[arg(long, default_value_t = TICK_RATE_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Milliseconds before a running probe is killed
    #[arg(long, default_value_t = PROBE_TIMEOUT_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Fixed y-axis ceiling in ms (auto-scaled when omitted)
    #[arg(long)]
    pub y_max: Option<f64>,

    /// Ping executable to invoke
    #[arg(long = "ping", default_value = DEFAULT_PING_PROGRAM)]
    pub ping_program: String,

    /// Record failed ticks as gaps in the chart
    #[arg(long)]
    pub record_gaps: bool,

    /// Print one line per tick instead of drawing the chart
    #[arg(long)]
    pub plain: bool,

    /// Write logs to this file (RUST_LOG sets the filter)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YScale {
    Fixed(f64),
    Auto,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Target,
    pub window: usize,
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub y_scale: YScale,
    pub ping_program: String,
    pub record_gaps: bool,
    pub plain: bool,
    pub log_file: Option<PathBuf>,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        let y_scale = match args.y_max {
            Some(max) if max.is_finite() && max > 0.0 => YScale::Fixed(max),
            _ => YScale::Auto,
        };
        Self {
            target: args.target,
            window: args.window.max(1),
            interval: Duration::from_millis(args.interval_ms),
            probe_timeout: Duration::from_millis(args.timeout_ms),
            y_scale,
            ping_program: args.ping_program,
            record_gaps: args.record_gaps,
            plain: args.plain,
            log_file: args.log_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(argv: &[&str]) -> Settings {
        Args::try_parse_from(argv).unwrap().into()
    }

    #[test]
    fn defaults() {
        let s = settings(&["pingchart", "1.1.1.1"]);
        assert_eq!(s.target.as_str(), "1.1.1.1");
        assert_eq!(s.window, DEFAULT_WINDOW);
        assert_eq!(s.interval, Duration::from_secs(1));
        assert_eq!(s.probe_timeout, Duration::from_millis(PROBE_TIMEOUT_MS));
        assert_eq!(s.y_scale, YScale::Auto);
        assert_eq!(s.ping_program, "ping");
        assert!(!s.plain && !s.record_gaps);
    }

    #[test]
    fn overrides() {
        let s = settings(&[
            "pingchart",
            "example.com",
            "--window",
            "100",
            "--y-max",
            "1000",
            "--interval-ms",
            "250",
            "--plain",
        ]);
        assert_eq!(s.window, 100);
        assert_eq!(s.y_scale, YScale::Fixed(1000.0));
        assert_eq!(s.interval, Duration::from_millis(250));
        assert!(s.plain);
    }

    #[test]
    fn non_positive_ceiling_falls_back_to_auto() {
        let s = settings(&["pingchart", "h", "--y-max", "0"]);
        assert_eq!(s.y_scale, YScale::Auto);
    }

    #[test]
    fn window_outside_range_is_rejected() {
        let max = MAX_WINDOW.to_string();
        let too_big = (MAX_WINDOW + 1).to_string();
        assert!(Args::try_parse_from(["pingchart", "h", "--window", "0"]).is_err());
        assert!(Args::try_parse_from(["pingchart", "h", "--window", too_big.as_str()]).is_err());
        assert!(
            Args::try_parse_from(["pingchart", "h", "--window", "18446744073709551615"]).is_err()
        );
        assert_eq!(settings(&["pingchart", "h", "--window", max.as_str()]).window, MAX_WINDOW);
    }

    #[test]
    fn target_is_required_and_non_empty() {
        assert!(Args::try_parse_from(["pingchart"]).is_err());
        assert!(Args::try_parse_from(["pingchart", " "]).is_err());
        assert!(Args::try_parse_from(["pingchart", "h", "--interval-ms", "0"]).is_err());
    }
}
