//! Utilities and functions to work with compiler metrics.

use std::{fmt, time::Duration};

use derive_more::Constructor;
use shade_pipeline::{interface::StageMetrics, settings::CompilerStageKind};
use shade_utils::indexmap::IndexMap;

#[derive(Debug, Default, Clone)]
pub struct StageMetricEntry {
    /// The total time spent in the stage, this recorded by the driver.
    pub total: Duration,

    /// The number of jobs that ran through the stage.
    pub runs: usize,

    /// Any child stage metrics that were collected by the stage itself.
    pub children: StageMetrics,
}

#[derive(Debug, Default, Clone)]
pub struct Metrics(pub IndexMap<CompilerStageKind, StageMetricEntry>);

impl Metrics {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, kind: CompilerStageKind) -> Option<&StageMetricEntry> {
        self.0.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record a run of the stage `kind` which took `time`.
    pub(crate) fn record(&mut self, kind: CompilerStageKind, time: Duration, children: &StageMetrics) {
        let entry = self.0.entry(kind).or_default();
        entry.total += time;
        entry.runs += 1;
        entry.children.merge(children);
    }

    /// The time spent in every stage.
    pub fn total(&self) -> Duration {
        self.0.values().map(|entry| entry.total).sum()
    }
}

/// Utility struct to report compiler metrics.
pub struct AggregateMetricReporter<'a> {
    /// The metrics that are going to be reported.
    metrics: &'a Metrics,

    /// The longest key in the metric report, this is for formatting
    /// purposes.
    longest_metric_key: usize,
}

impl<'a> AggregateMetricReporter<'a> {
    pub fn new(metrics: &'a Metrics) -> Self {
        let longest_metric_key = metrics
            .0
            .iter()
            .map(|(kind, metrics)| {
                let label_size = kind.as_str().len();
                metrics
                    .children
                    .iter()
                    .map(|(item, _)| label_size + item.len() + 2)
                    .max()
                    .unwrap_or(label_size)
            })
            .max()
            .unwrap_or(0)
            .max("total".len());

        Self { metrics, longest_metric_key }
    }
}

impl fmt::Display for AggregateMetricReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage_kind, stage_metric) in &self.metrics.0 {
            writeln!(
                f,
                "{}",
                MetricReporter::new(*stage_kind, None, stage_metric.total, self.longest_metric_key)
            )?;

            for (name, time) in stage_metric.children.iter() {
                writeln!(
                    f,
                    "{}",
                    MetricReporter::new(*stage_kind, Some(name), time, self.longest_metric_key)
                )?;
            }
        }

        write!(
            f,
            "{: <width$}: {}",
            "total",
            construct_duration_string(&self.metrics.total()),
            width = self.longest_metric_key
        )
    }
}

#[derive(Constructor)]
pub struct MetricReporter<'a> {
    kind: CompilerStageKind,
    child_name: Option<&'a str>,
    duration: Duration,
    longest_metric_key: usize,
}

impl fmt::Display for MetricReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { kind, child_name, duration, .. } = *self;

        let name =
            if let Some(name) = child_name { format!("{kind}::{name}") } else { format!("{kind}") };

        write!(
            f,
            "{: <width$}: {}",
            name,
            construct_duration_string(&duration),
            width = self.longest_metric_key
        )
    }
}

/// This will convert the given [Duration] into the number of milliseconds
/// taken, and format it so that it is always 12 characters wide.
fn construct_duration_string(duration: &Duration) -> String {
    format!("{:>10.6}ms", duration.as_secs_f64() * 1_000.0)
}
