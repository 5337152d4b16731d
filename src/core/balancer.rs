//! Least-concurrent endpoint selection for one logical service
//!
//! The balancer owns the endpoint pool and a table of attempts in flight per
//! endpoint. Selection excludes endpoints already tried by the current logical
//! request, picks among the least busy of what remains, and breaks ties at
//! random. Once every endpoint has been tried the exclusions are dropped so a
//! small pool never blocks a retry sequence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use reqwest::Url;
use tracing::{debug, info};

use super::attempt::ServiceAttempt;
use super::error::BalancerError;
use super::pool::UriPool;
use super::stats::{AttemptStatsSink, BalancerStats, EndpointStats};
use crate::metrics::BalancerMetrics;

/// State shared between a balancer and every attempt it hands out
#[derive(Debug)]
pub(crate) struct BalancerShared {
    pub(crate) service_type: String,
    pool: UriPool,
    /// Endpoint -> attempts in flight. Entries are removed when they reach zero.
    concurrency: Mutex<HashMap<Url, usize>>,
    pub(crate) stats: Arc<dyn AttemptStatsSink>,
}

impl BalancerShared {
    /// Pick an endpoint not in `tried` and count it as in flight.
    ///
    /// Clears `tried` when it already covers the whole pool.
    pub(crate) fn select(&self, tried: &mut HashSet<Url>) -> Result<Url, BalancerError> {
        let pool = self.pool.snapshot();

        let mut candidates: Vec<&Url> = pool.iter().filter(|uri| !tried.contains(*uri)).collect();
        if candidates.is_empty() {
            tried.clear();
            candidates = pool.iter().collect();
        }
        if candidates.is_empty() {
            BalancerMetrics::record_service_unavailable(&self.service_type);
            return Err(BalancerError::ServiceUnavailable {
                service: self.service_type.clone(),
            });
        }

        let mut concurrency = self.concurrency.lock();

        let mut min_load = usize::MAX;
        let mut least_loaded: Vec<&Url> = Vec::new();
        for uri in candidates {
            let load = concurrency.get(uri).copied().unwrap_or(0);
            if load < min_load {
                min_load = load;
                least_loaded.clear();
            }
            if load == min_load {
                least_loaded.push(uri);
            }
        }

        let mut rng = rand::rng();
        let chosen = least_loaded[rng.random_range(0..least_loaded.len())].clone();
        let count = concurrency.entry(chosen.clone()).or_insert(0);
        *count += 1;
        BalancerMetrics::set_in_flight(&self.service_type, chosen.as_str(), *count);

        debug!(
            service = %self.service_type,
            endpoint = %chosen,
            in_flight = min_load,
            excluded = tried.len(),
            "Selected endpoint"
        );
        Ok(chosen)
    }

    /// Resolve one attempt: flip its flag and release its slot under the table lock.
    ///
    /// Panics if the attempt was already resolved.
    pub(crate) fn release(&self, uri: &Url, resolved: &mut bool) {
        let mut concurrency = self.concurrency.lock();
        assert!(!*resolved, "attempt against {uri} was already resolved");
        *resolved = true;

        let remaining = match concurrency.get_mut(uri) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => panic!("no attempts in flight against {uri}"),
        };
        if remaining == 0 {
            concurrency.remove(uri);
        }
        BalancerMetrics::set_in_flight(&self.service_type, uri.as_str(), remaining);
    }

    fn in_flight(&self, uri: &Url) -> usize {
        self.concurrency.lock().get(uri).copied().unwrap_or(0)
    }
}

/// Client-side balancer for one logical service.
///
/// Cloning is cheap and clones share the pool and the in-flight table.
#[derive(Debug, Clone)]
pub struct ServiceBalancer {
    shared: Arc<BalancerShared>,
}

impl ServiceBalancer {
    /// Create a balancer with an empty pool that reports into `stats`
    pub fn new(service_type: impl Into<String>, stats: Arc<dyn AttemptStatsSink>) -> Self {
        Self {
            shared: Arc::new(BalancerShared {
                service_type: service_type.into(),
                pool: UriPool::empty(),
                concurrency: Mutex::new(HashMap::new()),
                stats,
            }),
        }
    }

    /// Create a balancer with its own in-memory statistics and an initial pool
    pub fn with_uris<I>(service_type: impl Into<String>, uris: I) -> Self
    where
        I: IntoIterator<Item = Url>,
    {
        let service_type = service_type.into();
        let stats = Arc::new(BalancerStats::new(service_type.clone()));
        let balancer = Self::new(service_type, stats);
        balancer.update_pool(uris);
        balancer
    }

    /// Choose an endpoint for the first attempt of a logical request
    pub fn begin_attempt(&self) -> Result<ServiceAttempt, BalancerError> {
        ServiceAttempt::select(Arc::clone(&self.shared), HashSet::new())
    }

    /// Replace the endpoint pool. Attempts already in flight are unaffected.
    pub fn update_pool<I>(&self, uris: I)
    where
        I: IntoIterator<Item = Url>,
    {
        let uris: HashSet<Url> = uris.into_iter().collect();
        let size = uris.len();
        let previous = self.shared.pool.replace(uris);
        if previous.len() != size {
            info!(
                service = %self.shared.service_type,
                previous = previous.len(),
                current = size,
                "Endpoint pool updated"
            );
        }
        BalancerMetrics::set_pool_size(&self.shared.service_type, size);
    }

    pub fn pool_snapshot(&self) -> Arc<HashSet<Url>> {
        self.shared.pool.snapshot()
    }

    /// Attempts currently in flight against `uri`
    pub fn in_flight(&self, uri: &Url) -> usize {
        self.shared.in_flight(uri)
    }

    pub fn service_type(&self) -> &str {
        &self.shared.service_type
    }

    /// Per-endpoint statistics gathered so far
    pub fn stats(&self) -> Vec<EndpointStats> {
        self.shared.stats.snapshot()
    }
}
