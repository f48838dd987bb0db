//! In-band manager lifecycle.
//!
//! [`InbandMgr`] owns the packet processor. `activate` registers it with the
//! packet service; `deactivate` unregisters it, drains pending rule
//! submissions and withdraws every rule the application installed.

use crate::bootstrap::BootstrapState;
use crate::config::InbandConfig;
use crate::dispatch::{PacketProcessor, PacketService};
use crate::error::{InbandError, Result};
use crate::flow::{ApplicationId, FlowProgrammer};
use crate::processor::InbandPacketProcessor;
use crate::topology::TopologyProvider;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

struct Registration {
    processor: Arc<InbandPacketProcessor>,
    handle: Arc<dyn PacketProcessor>,
}

/// In-band management bootstrap manager.
pub struct InbandMgr {
    config: InbandConfig,
    app_id: ApplicationId,
    topology: Arc<dyn TopologyProvider>,
    programmer: Arc<dyn FlowProgrammer>,
    packets: Arc<dyn PacketService>,
    active: Mutex<Option<Registration>>,
}

impl std::fmt::Debug for InbandMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InbandMgr")
            .field("app_id", &self.app_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl InbandMgr {
    /// Creates an inactive manager. Fails if `config` does not validate.
    pub fn new(
        config: InbandConfig,
        topology: Arc<dyn TopologyProvider>,
        programmer: Arc<dyn FlowProgrammer>,
        packets: Arc<dyn PacketService>,
    ) -> Result<Self> {
        config.validate()?;
        let app_id = ApplicationId::new(config.app.name.clone());

        Ok(Self {
            config,
            app_id,
            topology,
            programmer,
            packets,
            active: Mutex::new(None),
        })
    }

    pub fn app_id(&self) -> &ApplicationId {
        &self.app_id
    }

    pub fn config(&self) -> &InbandConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// The registered processor, while active.
    pub fn processor(&self) -> Option<Arc<InbandPacketProcessor>> {
        self.active
            .lock()
            .as_ref()
            .map(|r| Arc::clone(&r.processor))
    }

    /// Bootstrap state, or the initial state while inactive.
    pub fn bootstrap_state(&self) -> BootstrapState {
        self.processor()
            .map(|p| p.bootstrap_state())
            .unwrap_or_default()
    }

    /// Registers the packet processor.
    ///
    /// Must be called from within a tokio runtime; rule submissions are
    /// spawned on it.
    pub fn activate(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| InbandError::Runtime(format!("No tokio runtime: {}", e)))?;

        let mut active = self.active.lock();
        if active.is_some() {
            return Err(InbandError::AlreadyActive);
        }

        let processor = Arc::new(InbandPacketProcessor::new(
            &self.config.bootstrap,
            self.app_id.clone(),
            Arc::clone(&self.topology),
            Arc::clone(&self.programmer),
            runtime,
        ));

        if let Err(e) = processor.configured_bootstrap_switch() {
            warn!(error = %e, "Remote switches will never receive control paths");
        }

        let handle: Arc<dyn PacketProcessor> = processor.clone();
        self.packets
            .add_processor(Arc::clone(&handle), self.config.app.processor_priority);
        *active = Some(Registration { processor, handle });

        info!(app = %self.app_id, "In-band manager activated");
        Ok(())
    }

    /// Unregisters the processor and removes every rule owned by the
    /// application. Returns the number of rules removed.
    pub async fn deactivate(&self) -> Result<usize> {
        let registration = self.active.lock().take().ok_or(InbandError::NotActive)?;

        // A packet already inside `process` may still be resolving paths;
        // shutdown makes its submissions no-ops before rules are withdrawn.
        self.packets.remove_processor(&registration.handle);
        registration.processor.shutdown().await;
        let removed = registration.processor.remove_rules().await?;
        registration.processor.reset();

        info!(
            app = %self.app_id,
            removed,
            stats = ?registration.processor.stats(),
            "In-band manager deactivated"
        );
        Ok(removed)
    }
}
