//! Timing utilities for compiler stages.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{Level, log_enabled};

/// A [StageMetrics] is a collection of timings for each section of a stage.
#[derive(Default, Debug, Clone)]
pub struct StageMetrics {
    /// The collected timings for each section of the stage.
    pub timings: IndexMap<&'static str, Duration>,
}

impl StageMetrics {
    /// Merge another set of metrics into this one.
    pub fn merge(&mut self, other: &StageMetrics) {
        for (name, time) in other.iter() {
            self.add(name, time);
        }
    }

    /// Record `time` against `name`, accumulating with previous records.
    pub fn add(&mut self, name: &'static str, time: Duration) {
        self.timings.entry(name).and_modify(|total| *total += time).or_insert(time);
    }

    /// The total time spent across every section.
    pub fn total(&self) -> Duration {
        self.timings.values().sum()
    }

    /// Create an iterator over the collected timings.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.timings.iter().map(|(item, time)| (*item, *time))
    }

    /// Time `f` and record it under `name`.
    pub fn time_item<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let mut elapsed = None;
        let value = timed(f, Level::Info, |duration| elapsed = Some(duration));

        if let Some(duration) = elapsed {
            self.add(name, duration);
        }

        value
    }
}

/// Execute the given closure while timing it, and pass the duration to the
/// second closure. Timing is skipped entirely when `level` is not enabled.
#[inline(always)]
pub fn timed<T>(op: impl FnOnce() -> T, level: Level, on_elapsed: impl FnOnce(Duration)) -> T {
    if log_enabled!(level) {
        let begin = Instant::now();
        let result = op();
        on_elapsed(begin.elapsed());
        result
    } else {
        op()
    }
}
