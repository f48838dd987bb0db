//! Registry of switches seen by the packet processor.

use dashmap::DashSet;
use sonic_types::{ConnectPoint, SwitchId};
use std::collections::BTreeSet;

/// Append-only set of connect points packets have arrived on.
///
/// Backed by a sharded concurrent set, so `record` may be called from any
/// number of packet-handling threads without external locking.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    seen: DashSet<ConnectPoint>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connect point. Returns true on first sighting.
    pub fn record(&self, point: &ConnectPoint) -> bool {
        self.seen.insert(point.clone())
    }

    pub fn contains(&self, point: &ConnectPoint) -> bool {
        self.seen.contains(point)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Distinct switches across all recorded connect points.
    pub fn switches(&self) -> BTreeSet<SwitchId> {
        self.seen.iter().map(|cp| cp.switch().clone()).collect()
    }

    /// Drops every entry. Only used when the manager is deactivated.
    pub(crate) fn clear(&self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn cp(s: &str) -> ConnectPoint {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_reports_first_sighting() {
        let registry = SwitchRegistry::new();
        assert!(registry.record(&cp("SW-0/1")));
        assert!(!registry.record(&cp("SW-0/1")));
        assert!(registry.record(&cp("SW-0/2")));

        assert!(registry.contains(&cp("SW-0/1")));
        assert!(!registry.contains(&cp("SW-1/1")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.switches().len(), 1);
    }

    #[test]
    fn test_capacity_is_unbounded() {
        let registry = SwitchRegistry::new();
        for i in 0..1000 {
            registry.record(&cp(&format!("SW-{}/1", i)));
        }
        assert_eq!(registry.len(), 1000);
        assert!(registry.contains(&cp("SW-999/1")));
    }

    #[test]
    fn test_concurrent_record() {
        let registry = Arc::new(SwitchRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..200)
                        .filter(|i| registry.record(&cp(&format!("SW-{}/1", i))))
                        .count()
                })
            })
            .collect();

        let first_sightings: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(first_sightings, 200);
        assert_eq!(registry.len(), 200);
    }

    #[test]
    fn test_clear() {
        let registry = SwitchRegistry::new();
        registry.record(&cp("SW-0/1"));
        registry.clear();
        assert!(registry.is_empty());
    }
}
