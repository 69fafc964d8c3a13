//! Session usage metrics
//!
//! Every pipeline stage reports into one [`UsageAggregator`] owned by the
//! session. Records accumulate for the session's lifetime and are folded
//! into a [`UsageSummary`] exactly once at shutdown.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A single metric observation
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    /// Metric name
    pub name: String,
    /// Observed value
    pub value: MetricValue,
    /// When the observation was made
    pub timestamp: DateTime<Utc>,
}

/// Metric value kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Monotonic count (requests, characters, utterances)
    Count(u64),
    /// Elapsed time (audio seconds, generation latency)
    Duration(Duration),
}

/// Aggregated totals for one metric name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTotal {
    /// Metric name
    pub name: String,
    /// Sum of count observations
    pub count: u64,
    /// Sum of duration observations
    pub duration: Duration,
}

/// Deterministic fold of all records at session end
#[derive(Debug, Clone, Default)]
pub struct UsageSummary {
    /// Per-metric totals, ordered by first occurrence
    pub totals: Vec<MetricTotal>,
    /// Observations discarded as malformed
    pub dropped: u64,
}

impl UsageSummary {
    /// Total count for a metric name, zero if never recorded
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.totals
            .iter()
            .find(|t| t.name == name)
            .map_or(0, |t| t.count)
    }

    /// Total duration for a metric name, zero if never recorded
    #[must_use]
    pub fn duration(&self, name: &str) -> Duration {
        self.totals
            .iter()
            .find(|t| t.name == name)
            .map_or(Duration::ZERO, |t| t.duration)
    }
}

impl std::fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for total in &self.totals {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            if total.duration > Duration::ZERO {
                write!(f, "{}={:.2}s", total.name, total.duration.as_secs_f64())?;
                if total.count > 0 {
                    write!(f, " (n={})", total.count)?;
                }
            } else {
                write!(f, "{}={}", total.name, total.count)?;
            }
        }
        if self.dropped > 0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "dropped={}", self.dropped)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    records: Vec<UsageRecord>,
    dropped: u64,
}

/// Accumulates usage records emitted during a session
///
/// `record` is callable from any task; `summarize` drains a consistent
/// snapshot, so records arriving concurrently with shutdown are neither
/// lost nor double-counted.
#[derive(Default)]
pub struct UsageAggregator {
    inner: Mutex<Inner>,
}

impl UsageAggregator {
    /// Create an empty aggregator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation; never fails
    ///
    /// Malformed observations (empty name, zero-valued nonsense is fine but
    /// an unrepresentable value is not) are swallowed and counted in the
    /// `dropped` total.
    pub fn record(&self, name: &str, value: MetricValue) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if name.trim().is_empty() {
            inner.dropped += 1;
            return;
        }
        tracing::debug!(metric = name, ?value, "usage recorded");
        inner.records.push(UsageRecord {
            name: name.to_string(),
            value,
            timestamp: Utc::now(),
        });
    }

    /// Shorthand for recording a count of one
    pub fn record_count(&self, name: &str) {
        self.record(name, MetricValue::Count(1));
    }

    /// Shorthand for recording an elapsed duration
    pub fn record_duration(&self, name: &str, duration: Duration) {
        self.record(name, MetricValue::Duration(duration));
    }

    /// Number of records currently buffered
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.records.len())
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all buffered records and fold them into a summary
    ///
    /// Counts sum by name, durations sum by name; output order is the order
    /// in which each name was first seen.
    #[must_use]
    pub fn summarize(&self) -> UsageSummary {
        let (records, dropped) = {
            let Ok(mut inner) = self.inner.lock() else {
                return UsageSummary::default();
            };
            let dropped = inner.dropped;
            inner.dropped = 0;
            (std::mem::take(&mut inner.records), dropped)
        };

        let mut totals: Vec<MetricTotal> = Vec::new();
        for record in records {
            let idx = totals
                .iter()
                .position(|t| t.name == record.name)
                .unwrap_or_else(|| {
                    totals.push(MetricTotal {
                        name: record.name.clone(),
                        ..MetricTotal::default()
                    });
                    totals.len() - 1
                });
            match record.value {
                MetricValue::Count(n) => totals[idx].count += n,
                MetricValue::Duration(d) => totals[idx].duration += d,
            }
        }

        UsageSummary { totals, dropped }
    }
}
