use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use tracing::warn;

use super::balancer::BalancerShared;
use super::error::BalancerError;
use super::retry::FailureCategory;

/// One endpoint choice within a logical request's retry sequence.
///
/// The attempt holds one in-flight slot on its endpoint until it is resolved
/// with [`mark_good`](Self::mark_good) or [`mark_bad`](Self::mark_bad), which
/// must happen exactly once. Dropping an unresolved attempt releases the slot
/// and logs a warning.
pub struct ServiceAttempt {
    shared: Arc<BalancerShared>,
    uri: Url,
    /// Endpoints tried earlier in this sequence, not including `uri`
    tried: HashSet<Url>,
    started: Instant,
    resolved: bool,
}

impl ServiceAttempt {
    pub(crate) fn select(
        shared: Arc<BalancerShared>,
        mut tried: HashSet<Url>,
    ) -> Result<Self, BalancerError> {
        let uri = shared.select(&mut tried)?;
        Ok(Self {
            shared,
            uri,
            tried,
            started: Instant::now(),
            resolved: false,
        })
    }

    /// Endpoint chosen for this attempt
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Endpoints tried before this attempt in the current sequence
    pub fn tried(&self) -> &HashSet<Url> {
        &self.tried
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn mark_good(&mut self) {
        self.shared.release(&self.uri, &mut self.resolved);
        self.shared
            .stats
            .record_success(&self.uri, self.started.elapsed());
    }

    pub fn mark_bad(&mut self, category: FailureCategory) {
        self.shared.release(&self.uri, &mut self.resolved);
        self.shared
            .stats
            .record_failure(&self.uri, category, self.started.elapsed());
    }

    /// Select the follow-up attempt, excluding every endpoint tried so far.
    ///
    /// Panics if this attempt has not been resolved.
    pub fn next(&self) -> Result<ServiceAttempt, BalancerError> {
        assert!(
            self.resolved,
            "next() called before the attempt against {} was resolved",
            self.uri
        );
        let mut tried = self.tried.clone();
        tried.insert(self.uri.clone());
        ServiceAttempt::select(Arc::clone(&self.shared), tried)
    }
}

impl fmt::Debug for ServiceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAttempt")
            .field("service", &self.shared.service_type)
            .field("uri", &self.uri.as_str())
            .field("tried", &self.tried.len())
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl fmt::Display for ServiceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl Drop for ServiceAttempt {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(
                service = %self.shared.service_type,
                endpoint = %self.uri,
                "Attempt dropped without being resolved"
            );
            self.shared.release(&self.uri, &mut self.resolved);
        }
    }
}
