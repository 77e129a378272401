//! Deduplication of pods seen on a watch.

use std::collections::HashSet;

use crate::event::{Operation, UpdateEvent};
use crate::instance::Instance;

/// The set of instances a watch has already reported as present.
///
/// Only first sightings produce a notification. Deletions drop the instance from
/// the set so it is reported again if it comes back, but are not reported themselves.
#[derive(Debug, Default)]
pub struct MembershipCache {
    known: HashSet<Instance>,
}

impl MembershipCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event and returns the instance to report, if any.
    pub fn observe(&mut self, event: UpdateEvent) -> Option<Instance> {
        let instance = Instance::from_pod(event.pod)?;

        match event.operation {
            Operation::Added | Operation::Modified => {
                if self.known.contains(&instance) {
                    return None;
                }

                tracing::debug!("new instance: {instance}");
                self.known.insert(instance.clone());
                Some(instance)
            }

            Operation::Deleted => {
                if self.known.remove(&instance) {
                    tracing::debug!("removed instance: {instance}");
                }

                None
            }
        }
    }

    /// Whether the instance is currently known.
    #[must_use]
    pub fn contains(&self, instance: &Instance) -> bool {
        self.known.contains(instance)
    }

    /// Number of known instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no instance is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Forgets every known instance.
    pub fn clear(&mut self) {
        self.known.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::decode_event;

    fn event(operation: &str, name: &str, ip: Option<&str>) -> UpdateEvent {
        let status = ip.map_or_else(|| "{}".to_string(), |ip| format!(r#"{{"podIP":"{ip}"}}"#));
        let json = format!(
            r#"{{"type":"{operation}","object":{{"metadata":{{"name":"{name}"}},"status":{status}}}}}"#
        );

        decode_event(json.as_bytes()).unwrap()
    }

    #[test]
    fn first_add_notifies() {
        let mut cache = MembershipCache::new();
        let seen = cache.observe(event("ADDED", "nginx-1", Some("10.0.0.5")));

        assert_eq!(seen, Some(Instance::new("nginx-1", "10.0.0.5")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn duplicate_add_notifies_once() {
        let mut cache = MembershipCache::new();

        let notifications: Vec<_> = [
            event("ADDED", "nginx-1", Some("10.0.0.5")),
            event("ADDED", "nginx-1", Some("10.0.0.5")),
        ]
        .into_iter()
        .filter_map(|e| cache.observe(e))
        .collect();

        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn modified_for_known_instance_is_silent() {
        let mut cache = MembershipCache::new();

        assert!(cache.observe(event("ADDED", "nginx-1", Some("10.0.0.5"))).is_some());
        assert!(cache.observe(event("MODIFIED", "nginx-1", Some("10.0.0.5"))).is_none());
    }

    #[test]
    fn modified_for_unknown_instance_notifies() {
        let mut cache = MembershipCache::new();

        // Pods usually get their IP in a MODIFIED event after being ADDED without one.
        assert!(cache.observe(event("ADDED", "nginx-1", None)).is_none());
        assert_eq!(
            cache.observe(event("MODIFIED", "nginx-1", Some("10.0.0.5"))),
            Some(Instance::new("nginx-1", "10.0.0.5"))
        );
    }

    #[test]
    fn readd_after_delete_notifies_again() {
        let mut cache = MembershipCache::new();

        let notifications: Vec<_> = [
            event("ADDED", "nginx-1", Some("10.0.0.5")),
            event("DELETED", "nginx-1", Some("10.0.0.5")),
            event("ADDED", "nginx-1", Some("10.0.0.5")),
        ]
        .into_iter()
        .filter_map(|e| cache.observe(e))
        .collect();

        assert_eq!(notifications.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_is_never_reported() {
        let mut cache = MembershipCache::new();
        cache.observe(event("ADDED", "nginx-1", Some("10.0.0.5")));

        assert!(cache.observe(event("DELETED", "nginx-1", Some("10.0.0.5"))).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_of_unknown_instance_is_ignored() {
        let mut cache = MembershipCache::new();
        cache.observe(event("ADDED", "nginx-1", Some("10.0.0.5")));

        assert!(cache.observe(event("DELETED", "nginx-2", Some("10.0.0.6"))).is_none());
        assert!(cache.contains(&Instance::new("nginx-1", "10.0.0.5")));
    }

    #[test]
    fn new_address_is_a_new_instance() {
        let mut cache = MembershipCache::new();

        assert!(cache.observe(event("ADDED", "nginx-1", Some("10.0.0.5"))).is_some());
        assert!(cache.observe(event("MODIFIED", "nginx-1", Some("10.0.0.9"))).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn pods_without_ip_are_ignored() {
        let mut cache = MembershipCache::new();

        assert!(cache.observe(event("ADDED", "nginx-1", None)).is_none());
        assert!(cache.is_empty());
    }
}
