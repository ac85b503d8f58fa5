//! Registry of in-flight resolve operations

use crate::types::ServiceKey;
use std::collections::HashSet;

/// Tracks which services are currently awaiting resolution
///
/// A service is a member from the moment resolution is requested until the
/// first terminal resolve event (resolved, failed or stopped) is observed for
/// it. Membership is at most one per identity. The tracker is not
/// synchronized; the orchestrator owns it and serializes access.
#[derive(Debug, Default)]
pub struct ResolveTracker {
    pending: HashSet<ServiceKey>,
}

impl ResolveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a service as awaiting resolution
    ///
    /// Returns `false` if the service was already tracked.
    pub fn add(&mut self, key: ServiceKey) -> bool {
        self.pending.insert(key)
    }

    /// Clears a service after a terminal resolve event
    ///
    /// Removing a service that is not tracked is a no-op; returns whether an
    /// entry was actually removed.
    pub fn remove(&mut self, key: &ServiceKey) -> bool {
        self.pending.remove(key)
    }

    /// Returns whether a resolve is in flight for the service
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServiceDescriptor, ServiceType};

    fn key(name: &str) -> ServiceKey {
        ServiceDescriptor::local(&ServiceType::Http, name).key()
    }

    #[test]
    fn test_lifecycle() {
        let mut tracker = ResolveTracker::new();
        let k = key("Test Service");

        assert!(!tracker.contains(&k));
        assert!(tracker.add(k.clone()));
        assert!(tracker.contains(&k));
        assert!(tracker.remove(&k));
        assert!(!tracker.contains(&k));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut tracker = ResolveTracker::new();
        let k = key("Test Service");

        assert!(tracker.add(k.clone()));
        assert!(!tracker.add(k.clone()));
        assert_eq!(tracker.len(), 1);

        // A single removal clears the only entry
        assert!(tracker.remove(&k));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let mut tracker = ResolveTracker::new();
        assert!(!tracker.remove(&key("Unknown")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_tracks_distinct_identities() {
        let mut tracker = ResolveTracker::new();
        tracker.add(key("A"));
        tracker.add(key("B"));

        assert_eq!(tracker.len(), 2);
        tracker.remove(&key("A"));
        assert!(!tracker.contains(&key("A")));
        assert!(tracker.contains(&key("B")));
    }
}
