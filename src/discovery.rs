//! Endpoint discovery push
//!
//! The balancer never looks endpoints up itself. A [`PoolUpdater`] polls a
//! [`ServiceInventory`] and pushes the current set into
//! [`ServiceBalancer::update_pool`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BalancingClientConfig;
use crate::core::ServiceBalancer;
use crate::metrics::BalancerMetrics;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Service type={service} is not known to the inventory")]
    UnknownService { service: String },

    #[error("Invalid endpoint URI '{uri}': {reason}")]
    InvalidEndpoint { uri: String, reason: String },

    #[error("Inventory unavailable: {0}")]
    Unavailable(String),
}

/// Source of the live endpoint set for a service type
#[async_trait]
pub trait ServiceInventory: Send + Sync {
    async fn endpoints(&self, service_type: &str) -> Result<Vec<Url>, DiscoveryError>;
}

/// In-memory inventory whose contents are set programmatically
#[derive(Debug, Default)]
pub struct StaticInventory {
    services: RwLock<HashMap<String, Vec<Url>>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoints(&self, service_type: impl Into<String>, uris: Vec<Url>) {
        self.services.write().insert(service_type.into(), uris);
    }

    /// Parse and set endpoints given as strings
    pub fn set_endpoint_strs<S: AsRef<str>>(
        &self,
        service_type: impl Into<String>,
        uris: &[S],
    ) -> Result<(), DiscoveryError> {
        let parsed = uris
            .iter()
            .map(|uri| {
                let uri = uri.as_ref();
                Url::parse(uri).map_err(|err| DiscoveryError::InvalidEndpoint {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.set_endpoints(service_type, parsed);
        Ok(())
    }

    pub fn remove_service(&self, service_type: &str) {
        self.services.write().remove(service_type);
    }
}

#[async_trait]
impl ServiceInventory for StaticInventory {
    async fn endpoints(&self, service_type: &str) -> Result<Vec<Url>, DiscoveryError> {
        self.services
            .read()
            .get(service_type)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnknownService {
                service: service_type.to_string(),
            })
    }
}

/// Difference applied by one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolChange {
    pub added: Vec<Url>,
    pub removed: Vec<Url>,
}

impl PoolChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct PoolUpdater {
    balancer: ServiceBalancer,
    inventory: Arc<dyn ServiceInventory>,
    interval: Duration,
}

impl PoolUpdater {
    pub fn new(
        balancer: ServiceBalancer,
        inventory: Arc<dyn ServiceInventory>,
        config: &BalancingClientConfig,
    ) -> Self {
        Self::with_interval(balancer, inventory, config.discovery_refresh_interval())
    }

    pub fn with_interval(
        balancer: ServiceBalancer,
        inventory: Arc<dyn ServiceInventory>,
        interval: Duration,
    ) -> Self {
        Self {
            balancer,
            inventory,
            interval,
        }
    }

    /// Fetch the current endpoint set once and push it into the balancer.
    ///
    /// On error the pool is left untouched.
    pub async fn refresh(&self) -> Result<PoolChange, DiscoveryError> {
        let service = self.balancer.service_type();
        let next: HashSet<Url> = self.inventory.endpoints(service).await?.into_iter().collect();
        let current = self.balancer.pool_snapshot();

        let mut change = PoolChange {
            added: next.difference(&current).cloned().collect(),
            removed: current.difference(&next).cloned().collect(),
        };
        change.added.sort();
        change.removed.sort();

        for uri in &change.added {
            info!(service = %service, endpoint = %uri, "Endpoint added");
        }
        for uri in &change.removed {
            info!(service = %service, endpoint = %uri, "Endpoint removed");
        }
        if !change.is_empty() {
            BalancerMetrics::record_discovery_update(
                service,
                change.added.len(),
                change.removed.len(),
            );
        }

        self.balancer.update_pool(next);
        Ok(change)
    }

    /// Refresh on a fixed interval until the returned task is aborted
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(change) if !change.is_empty() => debug!(
                        service = %self.balancer.service_type(),
                        added = change.added.len(),
                        removed = change.removed.len(),
                        "Discovery refresh applied"
                    ),
                    Ok(_) => {}
                    Err(err) => warn!(
                        service = %self.balancer.service_type(),
                        error = %err,
                        "Discovery refresh failed, keeping current pool"
                    ),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn setup() -> (ServiceBalancer, Arc<StaticInventory>, PoolUpdater) {
        let balancer = ServiceBalancer::with_uris("search", Vec::<Url>::new());
        let inventory = Arc::new(StaticInventory::new());
        let updater = PoolUpdater::with_interval(
            balancer.clone(),
            inventory.clone(),
            Duration::from_millis(10),
        );
        (balancer, inventory, updater)
    }

    #[tokio::test]
    async fn test_refresh_reports_added_and_removed() {
        let (balancer, inventory, updater) = setup();

        inventory
            .set_endpoint_strs("search", &["http://a.example.com", "http://b.example.com"])
            .unwrap();
        let change = updater.refresh().await.unwrap();
        assert_eq!(
            change.added,
            vec![url("http://a.example.com"), url("http://b.example.com")]
        );
        assert!(change.removed.is_empty());
        assert_eq!(balancer.pool_snapshot().len(), 2);

        inventory
            .set_endpoint_strs("search", &["http://b.example.com", "http://c.example.com"])
            .unwrap();
        let change = updater.refresh().await.unwrap();
        assert_eq!(change.added, vec![url("http://c.example.com")]);
        assert_eq!(change.removed, vec![url("http://a.example.com")]);

        let unchanged = updater.refresh().await.unwrap();
        assert!(unchanged.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_keeps_pool() {
        let (balancer, inventory, updater) = setup();
        inventory.set_endpoints("search", vec![url("http://a.example.com")]);
        updater.refresh().await.unwrap();

        inventory.remove_service("search");
        let err = updater.refresh().await.unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::UnknownService {
                service: "search".to_string()
            }
        );
        assert_eq!(balancer.pool_snapshot().len(), 1);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let inventory = StaticInventory::new();
        let err = inventory
            .set_endpoint_strs("search", &["not a uri"])
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_background_updater_pushes_pool() {
        let (balancer, inventory, updater) = setup();
        inventory.set_endpoints("search", vec![url("http://a.example.com")]);

        let handle = updater.start();
        for _ in 0..50 {
            if !balancer.pool_snapshot().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(balancer.pool_snapshot().contains(&url("http://a.example.com")));
    }
}
