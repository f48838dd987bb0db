//! Topology provider interface and a static implementation.
//!
//! The manager never computes paths itself. It takes the provider's current
//! snapshot and asks for candidate paths between two switches.
//! [`StaticTopology`] serves a fixed link list for the daemon binary and for
//! tests.

use parking_lot::RwLock;
use sonic_types::{Link, Path, SwitchId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Upper bound on equal-cost paths enumerated per request.
const MAX_CANDIDATE_PATHS: usize = 64;

/// Immutable view of the topology at one point in time.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    epoch: u64,
    links: Arc<[Link]>,
}

impl Default for TopologySnapshot {
    fn default() -> Self {
        Self::new(0, Vec::new())
    }
}

impl TopologySnapshot {
    pub fn new(epoch: u64, links: impl Into<Arc<[Link]>>) -> Self {
        Self {
            epoch,
            links: links.into(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

/// Source of topology snapshots and path enumeration.
pub trait TopologyProvider: Send + Sync {
    /// Snapshot of the topology as currently known.
    fn current_topology(&self) -> TopologySnapshot;

    /// Candidate paths from `src` to `dst` in `snapshot`. May be empty.
    fn get_paths(&self, snapshot: &TopologySnapshot, src: &SwitchId, dst: &SwitchId) -> Vec<Path>;
}

/// Topology built from a configured link list.
///
/// Enumerates every shortest path (by hop count) between two switches.
#[derive(Debug, Default)]
pub struct StaticTopology {
    current: RwLock<TopologySnapshot>,
}

impl StaticTopology {
    /// Builds the topology. With `bidirectional`, the reverse of every link
    /// is added as well.
    pub fn new(links: Vec<Link>, bidirectional: bool) -> Self {
        let topology = Self::default();
        topology.replace_links(links, bidirectional);
        topology
    }

    /// Installs a new link set and advances the epoch.
    pub fn replace_links(&self, links: Vec<Link>, bidirectional: bool) {
        let mut links = if bidirectional {
            let reversed: Vec<Link> = links.iter().map(Link::reversed).collect();
            links.into_iter().chain(reversed).collect()
        } else {
            links
        };
        links.sort();
        links.dedup();

        let mut current = self.current.write();
        let epoch = current.epoch() + 1;
        *current = TopologySnapshot::new(epoch, links);
    }
}

impl TopologyProvider for StaticTopology {
    fn current_topology(&self) -> TopologySnapshot {
        self.current.read().clone()
    }

    fn get_paths(&self, snapshot: &TopologySnapshot, src: &SwitchId, dst: &SwitchId) -> Vec<Path> {
        shortest_paths(snapshot.links(), src, dst)
    }
}

/// All shortest paths from `src` to `dst` over directed `links`.
///
/// Returns an empty set when `src == dst` or `dst` is unreachable.
fn shortest_paths(links: &[Link], src: &SwitchId, dst: &SwitchId) -> Vec<Path> {
    if src == dst {
        return Vec::new();
    }

    let mut outgoing: HashMap<&SwitchId, Vec<&Link>> = HashMap::new();
    let mut incoming: HashMap<&SwitchId, Vec<&Link>> = HashMap::new();
    for link in links {
        outgoing.entry(link.src.switch()).or_default().push(link);
        incoming.entry(link.dst.switch()).or_default().push(link);
    }

    // Hop distance from every switch to `dst`, walking links backwards.
    let mut dist: HashMap<&SwitchId, usize> = HashMap::from([(dst, 0)]);
    let mut queue = VecDeque::from([dst]);
    while let Some(node) = queue.pop_front() {
        let d = dist[node];
        for link in incoming.get(node).into_iter().flatten() {
            let prev = link.src.switch();
            if !dist.contains_key(prev) {
                dist.insert(prev, d + 1);
                queue.push_back(prev);
            }
        }
    }

    if !dist.contains_key(src) {
        return Vec::new();
    }

    let mut paths = Vec::new();
    let mut stack: Vec<Link> = Vec::new();
    walk(src, &outgoing, &dist, &mut stack, &mut paths);
    paths
}

fn walk(
    node: &SwitchId,
    outgoing: &HashMap<&SwitchId, Vec<&Link>>,
    dist: &HashMap<&SwitchId, usize>,
    stack: &mut Vec<Link>,
    paths: &mut Vec<Path>,
) {
    if paths.len() >= MAX_CANDIDATE_PATHS {
        return;
    }
    if dist[node] == 0 {
        if let Ok(path) = Path::new(stack.clone()) {
            paths.push(path);
        }
        return;
    }

    for link in outgoing.get(node).into_iter().flatten() {
        let next = link.dst.switch();
        if dist.get(next).is_some_and(|&d| d + 1 == dist[node]) {
            stack.push((*link).clone());
            walk(next, outgoing, dist, stack, paths);
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sw(id: &str) -> SwitchId {
        id.parse().unwrap()
    }

    fn link(src: &str, dst: &str) -> Link {
        Link::new(src.parse().unwrap(), dst.parse().unwrap())
    }

    /// SW-7 -- SW-3 -- SW-0, plus a longer detour SW-7 -- SW-5 -- SW-6 -- SW-0.
    fn fabric() -> StaticTopology {
        StaticTopology::new(
            vec![
                link("SW-7/1", "SW-3/2"),
                link("SW-3/1", "SW-0/4"),
                link("SW-7/2", "SW-5/1"),
                link("SW-5/2", "SW-6/1"),
                link("SW-6/2", "SW-0/5"),
            ],
            true,
        )
    }

    #[test]
    fn test_shortest_path_only() {
        let topology = fabric();
        let snapshot = topology.current_topology();

        let paths = topology.get_paths(&snapshot, &sw("SW-7"), &sw("SW-0"));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].to_string(), "SW-7 -> SW-3 -> SW-0");
        assert_eq!(paths[0].src().port().as_u32(), 1);
    }

    #[test]
    fn test_reverse_direction() {
        let topology = fabric();
        let snapshot = topology.current_topology();

        let paths = topology.get_paths(&snapshot, &sw("SW-0"), &sw("SW-7"));
        assert_eq!(paths.len(), 1);
        let links = paths[0].links();
        assert_eq!(links[0], link("SW-0/4", "SW-3/1"));
        assert_eq!(links[1], link("SW-3/2", "SW-7/1"));
    }

    #[test]
    fn test_equal_cost_paths_enumerated() {
        let topology = StaticTopology::new(
            vec![
                link("A/1", "B/1"),
                link("A/2", "C/1"),
                link("B/2", "D/1"),
                link("C/2", "D/2"),
            ],
            false,
        );
        let snapshot = topology.current_topology();

        let paths = topology.get_paths(&snapshot, &sw("A"), &sw("D"));
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn test_unreachable_and_same_switch() {
        let topology = StaticTopology::new(vec![link("A/1", "B/1")], false);
        let snapshot = topology.current_topology();

        assert!(topology.get_paths(&snapshot, &sw("B"), &sw("A")).is_empty());
        assert!(topology.get_paths(&snapshot, &sw("A"), &sw("Z")).is_empty());
        assert!(topology.get_paths(&snapshot, &sw("A"), &sw("A")).is_empty());
    }

    #[test]
    fn test_replace_links_advances_epoch() {
        let topology = StaticTopology::new(vec![link("A/1", "B/1")], true);
        let before = topology.current_topology();
        assert_eq!(before.epoch(), 1);
        assert_eq!(before.links().len(), 2);

        topology.replace_links(vec![link("A/1", "C/1")], false);
        let after = topology.current_topology();
        assert_eq!(after.epoch(), 2);

        // An earlier snapshot keeps answering with the links it captured.
        assert_eq!(topology.get_paths(&before, &sw("A"), &sw("B")).len(), 1);
        assert!(topology.get_paths(&after, &sw("A"), &sw("B")).is_empty());
    }
}
