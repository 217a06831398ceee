use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::constants::MAX_WINDOW;

/// One probe observation. `latency_ms` is `None` for a recorded gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub latency_ms: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Local>, latency_ms: f64) -> Self {
        Self {
            timestamp,
            latency_ms: Some(latency_ms),
        }
    }

    pub fn gap(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            latency_ms: None,
        }
    }
}

/// Min / max / mean over the present latencies of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl RollingStats {
    pub fn from_latencies<I>(latencies: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in latencies {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return None;
        }
        Some(Self {
            min,
            max,
            mean: sum / count as f64,
            count,
        })
    }
}

/// Sliding window of the most recent samples, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    /// A capacity of zero is bumped to one. Only up to `MAX_WINDOW` slots are reserved up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(MAX_WINDOW)),
            capacity,
        }
    }

    /// Appends `sample`, returning the evicted oldest sample when the window was full.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn stats(&self) -> Option<RollingStats> {
        RollingStats::from_latencies(self.samples.iter().filter_map(|s| s.latency_ms))
    }

    pub fn nearest(&self, x: f64, y: f64) -> Option<(usize, &Sample)> {
        nearest_sample(self.samples.iter(), x, y)
    }
}

/// Finds the sample closest to `(x, y)` in (window index, latency) space.
///
/// Gaps are skipped. On a tie the earlier index wins.
pub fn nearest_sample<'a, I>(samples: I, x: f64, y: f64) -> Option<(usize, &'a Sample)>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut best: Option<(usize, &Sample, f64)> = None;
    for (idx, sample) in samples.into_iter().enumerate() {
        let Some(latency) = sample.latency_ms else {
            continue;
        };
        let dx = idx as f64 - x;
        let dy = latency - y;
        let dist = (dx * dx + dy * dy).sqrt();
        match best {
            Some((_, _, best_dist)) if best_dist <= dist => {}
            _ => best = Some((idx, sample, dist)),
        }
    }
    best.map(|(idx, sample, _)| (idx, sample))
}
