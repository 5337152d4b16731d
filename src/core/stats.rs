//! Per-endpoint attempt statistics
//!
//! Every resolved attempt is reported here with its elapsed time, tagged by
//! endpoint and outcome. Nothing read from the sink feeds back into routing.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Url;
use serde::Serialize;

use super::retry::FailureCategory;
use crate::metrics::BalancerMetrics;

/// Outcome class of a resolved attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "SUCCESS",
            AttemptOutcome::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives timing and outcome for every resolved attempt
pub trait AttemptStatsSink: Send + Sync + fmt::Debug {
    fn record_success(&self, uri: &Url, elapsed: Duration);

    fn record_failure(&self, uri: &Url, category: FailureCategory, elapsed: Duration);

    /// Aggregated counters for export; sinks that only forward may return nothing
    fn snapshot(&self) -> Vec<EndpointStats> {
        Vec::new()
    }
}

/// Aggregated counters for one (endpoint, outcome, category) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub outcome: AttemptOutcome,
    pub category: String,
    pub count: u64,
    pub total_latency: Duration,
    pub max_latency: Duration,
}

impl EndpointStats {
    pub fn mean_latency(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatKey {
    endpoint: String,
    outcome: AttemptOutcome,
    category: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct StatValue {
    count: u64,
    total_latency: Duration,
    max_latency: Duration,
}

/// Default sink: keeps counters in memory and mirrors them to the metrics facade
#[derive(Debug)]
pub struct BalancerStats {
    service_type: String,
    entries: DashMap<StatKey, StatValue>,
}

impl BalancerStats {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            entries: DashMap::new(),
        }
    }

    fn record(&self, uri: &Url, outcome: AttemptOutcome, category: String, elapsed: Duration) {
        let endpoint = uri.as_str().to_string();
        BalancerMetrics::record_attempt(
            &self.service_type,
            &endpoint,
            outcome.as_str(),
            &category,
            elapsed,
        );

        let key = StatKey {
            endpoint,
            outcome,
            category,
        };
        let mut value = self.entries.entry(key).or_default();
        value.count += 1;
        value.total_latency += elapsed;
        if elapsed > value.max_latency {
            value.max_latency = elapsed;
        }
    }

    /// Number of attempts recorded for an endpoint with the given outcome
    pub fn count(&self, uri: &Url, outcome: AttemptOutcome) -> u64 {
        self.entries
            .iter()
            .filter(|entry| entry.key().endpoint == uri.as_str() && entry.key().outcome == outcome)
            .map(|entry| entry.value().count)
            .sum()
    }

    pub fn reset(&self) {
        self.entries.clear();
    }
}

impl AttemptStatsSink for BalancerStats {
    fn record_success(&self, uri: &Url, elapsed: Duration) {
        self.record(uri, AttemptOutcome::Success, "success".to_string(), elapsed);
    }

    fn record_failure(&self, uri: &Url, category: FailureCategory, elapsed: Duration) {
        self.record(uri, AttemptOutcome::Failure, category.to_string(), elapsed);
    }

    fn snapshot(&self) -> Vec<EndpointStats> {
        let mut stats: Vec<EndpointStats> = self
            .entries
            .iter()
            .map(|entry| EndpointStats {
                endpoint: entry.key().endpoint.clone(),
                outcome: entry.key().outcome,
                category: entry.key().category.clone(),
                count: entry.value().count,
                total_latency: entry.value().total_latency,
                max_latency: entry.value().max_latency,
            })
            .collect();
        stats.sort_by(|a, b| {
            (&a.endpoint, a.outcome, &a.category).cmp(&(&b.endpoint, b.outcome, &b.category))
        });
        stats
    }
}
