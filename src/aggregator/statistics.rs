//! Running statistics over call durations.
//!
//! Samples are folded in with Welford's online update and two accumulators
//! combine with the pairwise (Chan et al.) formula, so no sample history is
//! ever kept.

use crate::callstack::OccurrenceNode;
use serde::{Deserialize, Serialize};

/// Running count/min/max/mean/variance of an integer sample stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    count: u64,
    min: Option<i64>,
    max: Option<i64>,
    total: i64,
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample in
    pub fn update(&mut self, sample: i64) {
        self.count += 1;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
        self.total += sample;

        let value = sample as f64;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combine with another accumulator as if its samples had been fed here
    pub fn merge(&mut self, other: &Statistics) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let n = n1 + n2;
        let delta = other.mean - self.mean;

        self.mean += delta * n2 / n;
        self.m2 += other.m2 + delta * delta * n1 * n2 / n;
        self.count += other.count;
        self.total += other.total;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    /// Sum of all samples
    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; `0.0` with fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Field of an occurrence a statistics accumulator is fed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Duration,
    SelfTime,
}

impl SampleField {
    pub fn extract(self, node: &OccurrenceNode) -> i64 {
        match self {
            SampleField::Duration => node.duration(),
            SampleField::SelfTime => node.self_time(),
        }
    }
}

/// Duration and self-time statistics of one aggregated call site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStatistics {
    duration: Statistics,
    self_time: Statistics,
}

impl CallStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence; its self time must already be final
    pub fn update(&mut self, node: &OccurrenceNode) {
        self.duration.update(SampleField::Duration.extract(node));
        self.self_time.update(SampleField::SelfTime.extract(node));
    }

    pub fn merge(&mut self, other: &CallStatistics) {
        self.duration.merge(&other.duration);
        self.self_time.merge(&other.self_time);
    }

    pub fn duration(&self) -> &Statistics {
        &self.duration
    }

    pub fn self_time(&self) -> &Statistics {
        &self.self_time
    }

    /// Number of occurrences recorded
    pub fn call_count(&self) -> u64 {
        self.duration.count
    }
}
