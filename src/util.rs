use chrono::{DateTime, Local};

use crate::history::RollingStats;
use crate::sampler::SkipCounters;

// Format a latency for labels: "23.40 ms", or "-" for a gap
pub fn format_latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) => format!("{:.2} ms", ms),
        None => "-".to_string(),
    }
}

pub fn format_clock(ts: &DateTime<Local>) -> String {
    ts.format("%H:%M:%S").to_string()
}

pub fn format_stats(stats: Option<&RollingStats>) -> [String; 3] {
    match stats {
        Some(s) => [
            format!("Max: {:.2} ms", s.max),
            format!("Min: {:.2} ms", s.min),
            format!("Avg: {:.2} ms", s.mean),
        ],
        None => [
            "Max: -".to_string(),
            "Min: -".to_string(),
            "Avg: -".to_string(),
        ],
    }
}

pub fn format_skips(skipped: &SkipCounters) -> String {
    format!(
        "skipped {} (timeout {}, unreachable {}, no latency {}, launch {})",
        skipped.total(),
        skipped.timeout,
        skipped.exit,
        skipped.unparsed,
        skipped.launch
    )
}
