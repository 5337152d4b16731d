//! Live endpoint set for one logical service

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use reqwest::Url;

/// Immutable set of endpoints behind an atomically swappable pointer.
///
/// Readers get a complete snapshot without taking a lock; writers replace the
/// whole set at once.
#[derive(Debug)]
pub struct UriPool {
    uris: ArcSwap<HashSet<Url>>,
}

impl UriPool {
    pub fn new<I>(uris: I) -> Self
    where
        I: IntoIterator<Item = Url>,
    {
        Self {
            uris: ArcSwap::from_pointee(uris.into_iter().collect()),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Current snapshot of the endpoint set
    pub fn snapshot(&self) -> Arc<HashSet<Url>> {
        self.uris.load_full()
    }

    /// Replace the endpoint set, returning the previous one
    pub fn replace(&self, uris: HashSet<Url>) -> Arc<HashSet<Url>> {
        self.uris.swap(Arc::new(uris))
    }

    pub fn len(&self) -> usize {
        self.uris.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.load().is_empty()
    }
}

impl Default for UriPool {
    fn default() -> Self {
        Self::empty()
    }
}
