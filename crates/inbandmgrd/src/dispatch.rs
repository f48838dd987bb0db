//! Packet dispatch to registered processors.

use crate::packet::InboundPacket;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Handles packets delivered by a [`PacketService`].
pub trait PacketProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Processes one packet. Must not panic on malformed input.
    fn process(&self, packet: &InboundPacket);
}

/// Registry of packet processors.
pub trait PacketService: Send + Sync {
    /// Registers `processor`. Lower priority values see packets first.
    fn add_processor(&self, processor: Arc<dyn PacketProcessor>, priority: u32);

    /// Unregisters `processor`. Returns false if it was not registered.
    fn remove_processor(&self, processor: &Arc<dyn PacketProcessor>) -> bool;
}

/// In-process [`PacketService`].
///
/// Processors are ordered by priority; equal priorities keep registration
/// order.
#[derive(Default)]
pub struct PacketDispatcher {
    processors: RwLock<BTreeMap<u32, Vec<Arc<dyn PacketProcessor>>>>,
}

impl std::fmt::Debug for PacketDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDispatcher")
            .field("processors", &self.len())
            .finish()
    }
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.processors.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `packet` to every processor. Returns how many saw it.
    pub fn dispatch(&self, packet: &InboundPacket) -> usize {
        // Snapshot so processors may (un)register without deadlocking.
        let processors: Vec<Arc<dyn PacketProcessor>> =
            self.processors.read().values().flatten().cloned().collect();

        for processor in &processors {
            processor.process(packet);
        }
        processors.len()
    }
}

impl PacketService for PacketDispatcher {
    fn add_processor(&self, processor: Arc<dyn PacketProcessor>, priority: u32) {
        info!(name = processor.name(), priority, "Registering packet processor");
        self.processors.write().entry(priority).or_default().push(processor);
    }

    fn remove_processor(&self, processor: &Arc<dyn PacketProcessor>) -> bool {
        let mut processors = self.processors.write();
        let mut removed = false;
        processors.retain(|_, group| {
            let before = group.len();
            group.retain(|p| !Arc::ptr_eq(p, processor));
            removed |= group.len() != before;
            !group.is_empty()
        });
        if removed {
            debug!(name = processor.name(), "Removed packet processor");
        }
        removed
    }
}
