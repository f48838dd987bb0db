//! Path resolution between two switches.

use crate::error::{InbandError, Result};
use crate::topology::TopologyProvider;
use sonic_types::{Path, SwitchId};
use std::sync::Arc;
use tracing::debug;

/// Resolves one path between two switches against the current topology.
#[derive(Clone)]
pub struct PathResolver {
    topology: Arc<dyn TopologyProvider>,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver").finish_non_exhaustive()
    }
}

impl PathResolver {
    pub fn new(topology: Arc<dyn TopologyProvider>) -> Self {
        Self { topology }
    }

    /// Resolves a path from `src` to `dst` using the snapshot current at
    /// call time.
    ///
    /// # Errors
    ///
    /// [`InbandError::NoPathFound`] when the provider returns no candidates.
    pub fn resolve_path(&self, src: &SwitchId, dst: &SwitchId) -> Result<Path> {
        let snapshot = self.topology.current_topology();
        let candidates = self.topology.get_paths(&snapshot, src, dst);
        let count = candidates.len();

        let path = select_path(candidates).ok_or_else(|| InbandError::no_path(src, dst))?;
        debug!(
            %src,
            %dst,
            epoch = snapshot.epoch(),
            candidates = count,
            path = %path,
            "Resolved path"
        );
        Ok(path)
    }
}

/// Picks one path deterministically: fewest links first, then the lowest
/// path in link order.
pub fn select_path(candidates: impl IntoIterator<Item = Path>) -> Option<Path> {
    candidates
        .into_iter()
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}
