//! Subscription Tracking Types
//!
//! Domain types for tracking which consumers are attached to one producer
//! execution of the broadcast hub.
//!
//! # Design
//!
//! The registry is a reference count over subscriber IDs. It reports the
//! two transitions the hub acts on:
//! - first subscriber attached (0 → 1): the producer must start
//! - last subscriber detached (1 → 0): the producer must stop
//!
//! Every other attach or detach leaves the producer untouched, so many
//! consumers share a single upstream execution.

use std::collections::HashSet;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a subscriber (one transport-level client).
pub type SubscriberId = u64;

/// Allocate a fresh subscriber ID.
#[must_use]
pub fn next_subscriber_id() -> SubscriberId {
    uuid::Uuid::new_v4().as_u64_pair().0
}

/// Producer demand change caused by an attach or detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandChange {
    /// Subscriber count went 0 → 1.
    Started,
    /// Subscriber count went 1 → 0.
    Released,
    /// Subscriber count changed without crossing zero.
    Unchanged,
}

// =============================================================================
// Subscriber Registry
// =============================================================================

/// Set of subscribers attached to one producer execution.
///
/// Not synchronized on its own; the broadcast hub keeps it behind the same
/// lock as the execution handle so start/stop decisions are serialized.
///
/// # Example
///
/// ```rust
/// use price_stream::domain::subscription::{DemandChange, SubscriberRegistry};
///
/// let mut registry = SubscriberRegistry::new();
///
/// assert_eq!(registry.add(1), DemandChange::Started);
/// assert_eq!(registry.add(2), DemandChange::Unchanged);
///
/// assert_eq!(registry.remove(1), DemandChange::Unchanged);
/// assert_eq!(registry.remove(2), DemandChange::Released);
/// ```
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: HashSet<SubscriberId>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Adding an ID twice is a no-op and reports `Unchanged`.
    pub fn add(&mut self, id: SubscriberId) -> DemandChange {
        let was_empty = self.is_empty();
        if !self.members.insert(id) {
            return DemandChange::Unchanged;
        }

        if was_empty {
            DemandChange::Started
        } else {
            DemandChange::Unchanged
        }
    }

    /// Remove a subscriber.
    ///
    /// Removing an unknown ID is a no-op and reports `Unchanged`.
    pub fn remove(&mut self, id: SubscriberId) -> DemandChange {
        if !self.members.remove(&id) {
            return DemandChange::Unchanged;
        }

        if self.is_empty() {
            DemandChange::Released
        } else {
            DemandChange::Unchanged
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_add_starts_demand() {
        let mut registry = SubscriberRegistry::new();
        assert_eq!(registry.add(7), DemandChange::Started);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove(7), DemandChange::Released);
    }

    #[test]
    fn later_adds_do_not_restart() {
        let mut registry = SubscriberRegistry::new();
        registry.add(1);
        assert_eq!(registry.add(2), DemandChange::Unchanged);
        assert_eq!(registry.add(3), DemandChange::Unchanged);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut registry = SubscriberRegistry::new();
        registry.add(1);
        assert_eq!(registry.add(1), DemandChange::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_remove_releases_demand() {
        let mut registry = SubscriberRegistry::new();
        registry.add(1);
        registry.add(2);

        assert_eq!(registry.remove(2), DemandChange::Unchanged);
        assert_eq!(registry.remove(1), DemandChange::Released);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_remove_is_ignored() {
        let mut registry = SubscriberRegistry::new();
        assert_eq!(registry.remove(42), DemandChange::Unchanged);

        registry.add(1);
        assert_eq!(registry.remove(42), DemandChange::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn demand_can_restart_after_release() {
        let mut registry = SubscriberRegistry::new();
        registry.add(1);
        registry.remove(1);
        assert_eq!(registry.add(2), DemandChange::Started);
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let a = next_subscriber_id();
        let b = next_subscriber_id();
        assert_ne!(a, b);
    }
}
