//! Control-path rule installation.
//!
//! Two directional policies:
//!
//! - **Up-path** (remote switch → controller): one rule on the remote switch
//!   sending TCP traffic for the controller port out of the first hop of
//!   the remote → bootstrap path.
//! - **Down-path** (controller → remote switch): one rule per link of the
//!   bootstrap → remote path, matching the requester's MAC/IPv4 address and
//!   TCP traffic from the controller port.
//!
//! Submissions are fire-and-forget: each objective is spawned onto the
//! runtime and tracked, so shutdown can wait for in-flight requests. Once
//! [`RuleInstaller::shutdown`] has started, new submissions are dropped.

use crate::config::{
    BootstrapConfig, DEFAULT_CONTROL_PORT, DEFAULT_DOWN_PATH_PRIORITY, DEFAULT_UP_PATH_PRIORITY,
};
use crate::error::{InbandError, Result};
use crate::flow::{
    ApplicationId, FlowProgrammer, ForwardingObjective, TrafficSelector, TrafficTreatment,
};
use crate::packet::{ether_type, ip_protocol, InboundPacket};
use crate::path::PathResolver;
use crate::processor::ProcessorStats;
use parking_lot::RwLock;
use sonic_types::{Ipv4Prefix, MacAddress, PortNumber, SwitchId};
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Selector constants and priorities for control-path rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulePolicy {
    pub control_port: u16,
    pub up_path_priority: u16,
    pub down_path_priority: u16,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            control_port: DEFAULT_CONTROL_PORT,
            up_path_priority: DEFAULT_UP_PATH_PRIORITY,
            down_path_priority: DEFAULT_DOWN_PATH_PRIORITY,
        }
    }
}

impl From<&BootstrapConfig> for RulePolicy {
    fn from(config: &BootstrapConfig) -> Self {
        Self {
            control_port: config.control_port,
            up_path_priority: config.up_path_priority,
            down_path_priority: config.down_path_priority,
        }
    }
}

pub struct RuleInstaller {
    app_id: ApplicationId,
    policy: RulePolicy,
    resolver: PathResolver,
    programmer: Arc<dyn FlowProgrammer>,
    stats: Arc<ProcessorStats>,
    tracker: TaskTracker,
    runtime: Handle,
    closed: RwLock<bool>,
}

impl std::fmt::Debug for RuleInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleInstaller")
            .field("app_id", &self.app_id)
            .field("policy", &self.policy)
            .field("pending", &self.tracker.len())
            .field("closed", &*self.closed.read())
            .finish()
    }
}

impl RuleInstaller {
    pub fn new(
        app_id: ApplicationId,
        policy: RulePolicy,
        resolver: PathResolver,
        programmer: Arc<dyn FlowProgrammer>,
        stats: Arc<ProcessorStats>,
        runtime: Handle,
    ) -> Self {
        Self {
            app_id,
            policy,
            resolver,
            programmer,
            stats,
            tracker: TaskTracker::new(),
            runtime,
            closed: RwLock::new(false),
        }
    }

    pub fn app_id(&self) -> &ApplicationId {
        &self.app_id
    }

    /// Rule sending controller-bound TCP traffic out of `egress`.
    pub fn up_path_objective(&self, egress: PortNumber) -> ForwardingObjective {
        let selector = TrafficSelector::builder()
            .match_ip_protocol(ip_protocol::TCP)
            .match_eth_type(ether_type::IPV4)
            .match_tcp_dst(self.policy.control_port)
            .build();

        ForwardingObjective::new(selector, TrafficTreatment::output(egress), self.app_id.clone())
            .with_priority(self.policy.up_path_priority)
    }

    /// Rule steering controller replies for one requester out of `egress`.
    pub fn down_path_objective(
        &self,
        host_mac: MacAddress,
        host_ip: Ipv4Addr,
        egress: PortNumber,
    ) -> ForwardingObjective {
        let selector = TrafficSelector::builder()
            .match_eth_dst(host_mac)
            .match_ip_protocol(ip_protocol::TCP)
            .match_eth_type(ether_type::IPV4)
            .match_ipv4_dst(Ipv4Prefix::host(host_ip))
            .match_tcp_src(self.policy.control_port)
            .build();

        ForwardingObjective::new(selector, TrafficTreatment::output(egress), self.app_id.clone())
            .with_priority(self.policy.down_path_priority)
    }

    /// Installs the up-path rule on `remote`. Returns the number of rules
    /// submitted.
    pub fn install_up_path(&self, remote: &SwitchId, anchor: &SwitchId) -> Result<usize> {
        let path = self.resolver.resolve_path(remote, anchor)?;
        let egress = path.src().port();

        let submitted = self.submit(remote.clone(), self.up_path_objective(egress));
        Ok(usize::from(submitted))
    }

    /// Installs one down-path rule per link of the `anchor` → requester path.
    /// Returns the number of rules submitted.
    pub fn install_down_path(&self, packet: &InboundPacket, anchor: &SwitchId) -> Result<usize> {
        let remote = packet.switch();
        let ipv4 = packet
            .frame
            .ipv4
            .as_ref()
            .ok_or_else(|| InbandError::MissingIpv4Header {
                device: remote.clone(),
            })?;
        let path = self.resolver.resolve_path(anchor, remote)?;

        let submitted = path
            .links()
            .iter()
            .filter(|link| {
                let objective =
                    self.down_path_objective(packet.frame.src, ipv4.src, link.src.port());
                self.submit(link.src.switch().clone(), objective)
            })
            .count();
        Ok(submitted)
    }

    /// Spawns one `forward` call. Returns false if the installer is shut down.
    fn submit(&self, device: SwitchId, objective: ForwardingObjective) -> bool {
        // Held across the spawn; `shutdown` flips the flag under the write lock.
        let closed = self.closed.read();
        if *closed {
            debug!(%device, priority = objective.priority, "Installer shut down, objective dropped");
            return false;
        }
        self.stats.rules_submitted.fetch_add(1, Ordering::Relaxed);

        let programmer = Arc::clone(&self.programmer);
        let stats = Arc::clone(&self.stats);
        self.tracker.spawn_on(
            async move {
                let priority = objective.priority;
                match programmer.forward(&device, objective).await {
                    Ok(()) => debug!(%device, priority, "Forwarding objective accepted"),
                    Err(e) => {
                        stats.install_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(%device, priority, error = %e, "Forwarding objective failed");
                    }
                }
            },
            &self.runtime,
        );
        true
    }

    /// Number of submissions still in flight.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every submission made so far has completed.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;

        let closed = self.closed.read();
        if !*closed {
            self.tracker.reopen();
        }
    }

    /// Stops accepting submissions, then waits for the in-flight ones.
    pub async fn shutdown(&self) {
        {
            let mut closed = self.closed.write();
            *closed = true;
            self.tracker.close();
        }
        self.tracker.wait().await;
    }

    /// Removes every rule owned by this installer's application.
    pub async fn remove_all(&self) -> Result<usize> {
        self.programmer.remove_all_by_owner(&self.app_id).await
    }
}
