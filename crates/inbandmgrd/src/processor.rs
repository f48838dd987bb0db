//! In-band packet processor.
//!
//! Entry point for every inbound packet:
//!
//! 1. Record the arrival connect point in the switch registry
//! 2. Optionally drop LLDP/BSN discovery frames
//! 3. Ignore anything that is not an in-band request
//! 4. Feed the bootstrap detector; for a remote request, install the
//!    up-path rule and then the down-path rules
//!
//! Per-packet failures are logged and counted here and never propagate to
//! the dispatcher.

use crate::bootstrap::{BootstrapDetector, BootstrapEvent, BootstrapState};
use crate::classifier::PacketClassifier;
use crate::config::BootstrapConfig;
use crate::dispatch::PacketProcessor;
use crate::error::{InbandError, Result};
use crate::flow::{ApplicationId, FlowProgrammer};
use crate::installer::{RuleInstaller, RulePolicy};
use crate::packet::InboundPacket;
use crate::path::PathResolver;
use crate::registry::SwitchRegistry;
use crate::topology::TopologyProvider;
use sonic_types::SwitchId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// What the processor did with one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketDisposition {
    /// Not addressed to the in-band discovery MAC.
    NotInbandRequest,
    /// LLDP/BSN frame dropped by configuration.
    DiscoveryFrameDropped,
    /// This packet latched the bootstrap switch.
    BootstrapLatched(SwitchId),
    /// Request from the already-latched bootstrap switch.
    FromBootstrapSwitch,
    /// Request from a remote switch before bootstrap completed.
    AwaitingBootstrap,
    /// Control-path rules were submitted for `remote`.
    RulesRequested {
        remote: SwitchId,
        up_rules: usize,
        down_rules: usize,
    },
}

/// Processor counters.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    pub packets_seen: AtomicU64,
    pub inband_requests: AtomicU64,
    pub bootstrap_latches: AtomicU64,
    pub ignored_before_bootstrap: AtomicU64,
    pub rules_submitted: AtomicU64,
    pub path_failures: AtomicU64,
    pub missing_ipv4: AtomicU64,
    pub install_failures: AtomicU64,
}

/// Plain copy of [`ProcessorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStatsSnapshot {
    pub packets_seen: u64,
    pub inband_requests: u64,
    pub bootstrap_latches: u64,
    pub ignored_before_bootstrap: u64,
    pub rules_submitted: u64,
    pub path_failures: u64,
    pub missing_ipv4: u64,
    pub install_failures: u64,
}

impl ProcessorStats {
    pub fn snapshot(&self) -> ProcessorStatsSnapshot {
        ProcessorStatsSnapshot {
            packets_seen: self.packets_seen.load(Ordering::Relaxed),
            inband_requests: self.inband_requests.load(Ordering::Relaxed),
            bootstrap_latches: self.bootstrap_latches.load(Ordering::Relaxed),
            ignored_before_bootstrap: self.ignored_before_bootstrap.load(Ordering::Relaxed),
            rules_submitted: self.rules_submitted.load(Ordering::Relaxed),
            path_failures: self.path_failures.load(Ordering::Relaxed),
            missing_ipv4: self.missing_ipv4.load(Ordering::Relaxed),
            install_failures: self.install_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct InbandPacketProcessor {
    registry: SwitchRegistry,
    classifier: PacketClassifier,
    detector: BootstrapDetector,
    installer: RuleInstaller,
    stats: Arc<ProcessorStats>,
    ignore_discovery_frames: bool,
}

impl InbandPacketProcessor {
    /// Creates a processor. Rule submissions run on `runtime`.
    pub fn new(
        config: &BootstrapConfig,
        app_id: ApplicationId,
        topology: Arc<dyn TopologyProvider>,
        programmer: Arc<dyn FlowProgrammer>,
        runtime: Handle,
    ) -> Self {
        let stats = Arc::new(ProcessorStats::default());
        let installer = RuleInstaller::new(
            app_id,
            RulePolicy::from(config),
            PathResolver::new(topology),
            programmer,
            Arc::clone(&stats),
            runtime,
        );

        Self {
            registry: SwitchRegistry::new(),
            classifier: PacketClassifier::default(),
            detector: BootstrapDetector::new(config.bootstrap_switch_id.clone()),
            installer,
            stats,
            ignore_discovery_frames: config.ignore_discovery_frames,
        }
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    pub fn bootstrap_state(&self) -> BootstrapState {
        self.detector.state()
    }

    /// The configured bootstrap switch, or `UnknownBootstrapSwitch`.
    pub fn configured_bootstrap_switch(&self) -> Result<&SwitchId> {
        self.detector.configured()
    }

    pub fn app_id(&self) -> &ApplicationId {
        self.installer.app_id()
    }

    pub fn stats(&self) -> ProcessorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Handles one inbound packet.
    pub fn handle_packet(&self, packet: &InboundPacket) -> PacketDisposition {
        self.stats.packets_seen.fetch_add(1, Ordering::Relaxed);

        if self.registry.record(&packet.received_from) {
            debug!(point = %packet.received_from, "New switch connect point");
        }

        if self.ignore_discovery_frames && self.classifier.is_control_frame(packet) {
            return PacketDisposition::DiscoveryFrameDropped;
        }

        if !self.classifier.is_inband_request(packet) {
            return PacketDisposition::NotInbandRequest;
        }
        self.stats.inband_requests.fetch_add(1, Ordering::Relaxed);

        let origin = packet.switch();
        debug!(switch = %origin, src = %packet.frame.src, "In-band request");

        match self.detector.observe(origin) {
            BootstrapEvent::Latched(switch) => {
                self.stats.bootstrap_latches.fetch_add(1, Ordering::Relaxed);
                info!(%switch, "Bootstrap switch latched");
                PacketDisposition::BootstrapLatched(switch)
            }
            BootstrapEvent::FromBootstrapSwitch => PacketDisposition::FromBootstrapSwitch,
            BootstrapEvent::Awaiting => {
                self.stats
                    .ignored_before_bootstrap
                    .fetch_add(1, Ordering::Relaxed);
                debug!(switch = %origin, "Bootstrap not established, request ignored");
                PacketDisposition::AwaitingBootstrap
            }
            BootstrapEvent::Remote { anchor } => self.install_control_paths(packet, &anchor),
        }
    }

    fn install_control_paths(&self, packet: &InboundPacket, anchor: &SwitchId) -> PacketDisposition {
        let remote = packet.switch();

        let up_rules = self
            .installer
            .install_up_path(remote, anchor)
            .unwrap_or_else(|e| self.record_failure("up", &e));
        let down_rules = self
            .installer
            .install_down_path(packet, anchor)
            .unwrap_or_else(|e| self.record_failure("down", &e));

        info!(
            %remote,
            %anchor,
            up_rules,
            down_rules,
            "Control path rules requested"
        );

        PacketDisposition::RulesRequested {
            remote: remote.clone(),
            up_rules,
            down_rules,
        }
    }

    fn record_failure(&self, direction: &str, error: &InbandError) -> usize {
        match error {
            InbandError::NoPathFound { .. } => {
                self.stats.path_failures.fetch_add(1, Ordering::Relaxed);
            }
            InbandError::MissingIpv4Header { .. } => {
                self.stats.missing_ipv4.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        warn!(direction, error = %error, "Skipping control path direction");
        0
    }

    /// Waits for every in-flight rule submission.
    pub async fn wait_idle(&self) {
        self.installer.wait_idle().await;
    }

    /// Stops submitting rules and waits for in-flight submissions. Packets
    /// handled afterwards still update the registry and detector but install
    /// nothing.
    pub async fn shutdown(&self) {
        self.installer.shutdown().await;
    }

    /// Removes every rule owned by this processor's application.
    pub async fn remove_rules(&self) -> Result<usize> {
        self.installer.remove_all().await
    }

    /// Discards learned state: bootstrap latch and switch registry.
    pub(crate) fn reset(&self) {
        self.detector.reset();
        self.registry.clear();
    }
}

impl PacketProcessor for InbandPacketProcessor {
    fn name(&self) -> &str {
        self.installer.app_id().name()
    }

    fn process(&self, packet: &InboundPacket) {
        self.handle_packet(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::BootstrapPhase;
    use crate::flow::LoggingFlowProgrammer;
    use crate::packet::{ether_type, ip_protocol, EthernetFrame, Ipv4Header};
    use crate::topology::StaticTopology;
    use pretty_assertions::assert_eq;
    use sonic_types::Link;
    use std::net::Ipv4Addr;

    fn sw(id: &str) -> SwitchId {
        id.parse().unwrap()
    }

    fn processor(bootstrap: Option<&str>, programmer: Arc<LoggingFlowProgrammer>) -> InbandPacketProcessor {
        let topology = StaticTopology::new(
            vec![Link::new("SW-7/1".parse().unwrap(), "SW-0/2".parse().unwrap())],
            true,
        );
        let config = BootstrapConfig {
            bootstrap_switch_id: bootstrap.map(sw),
            ..Default::default()
        };
        InbandPacketProcessor::new(
            &config,
            ApplicationId::new("test.inband"),
            Arc::new(topology),
            programmer,
            Handle::current(),
        )
    }

    fn frame(dst: &str, ether_type: u16) -> EthernetFrame {
        EthernetFrame {
            src: "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            dst: dst.parse().unwrap(),
            ether_type,
            ipv4: Some(Ipv4Header {
                src: Ipv4Addr::new(10, 0, 0, 7),
                dst: Ipv4Addr::new(10, 0, 0, 1),
                protocol: ip_protocol::UDP,
            }),
        }
    }

    fn request(at: &str) -> InboundPacket {
        InboundPacket::new(at.parse().unwrap(), frame("00:00:00:ff:ff:ff", ether_type::IPV4))
    }

    #[tokio::test]
    async fn test_non_request_only_registers_switch() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let processor = processor(Some("SW-0"), Arc::clone(&programmer));
        let packet = InboundPacket::new("SW-0/1".parse().unwrap(), frame("ff:ff:ff:ff:ff:ff", ether_type::IPV4));

        assert_eq!(processor.handle_packet(&packet), PacketDisposition::NotInbandRequest);
        assert!(processor.registry().contains(&"SW-0/1".parse().unwrap()));
        assert_eq!(processor.bootstrap_state().phase(), BootstrapPhase::AwaitingBootstrap);
        assert_eq!(processor.stats().inband_requests, 0);

        processor.wait_idle().await;
        assert!(programmer.installed().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_then_remote() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let processor = processor(Some("SW-0"), Arc::clone(&programmer));

        assert_eq!(
            processor.handle_packet(&request("SW-0/3")),
            PacketDisposition::BootstrapLatched(sw("SW-0"))
        );
        assert_eq!(
            processor.handle_packet(&request("SW-0/3")),
            PacketDisposition::FromBootstrapSwitch
        );
        assert_eq!(
            processor.handle_packet(&request("SW-7/5")),
            PacketDisposition::RulesRequested {
                remote: sw("SW-7"),
                up_rules: 1,
                down_rules: 1,
            }
        );

        processor.wait_idle().await;
        assert_eq!(programmer.installed_on(&sw("SW-7")).len(), 1);
        assert_eq!(programmer.installed_on(&sw("SW-0")).len(), 1);

        let stats = processor.stats();
        assert_eq!(stats.packets_seen, 3);
        assert_eq!(stats.bootstrap_latches, 1);
        assert_eq!(stats.rules_submitted, 2);
        assert_eq!(stats.install_failures, 0);
    }

    #[tokio::test]
    async fn test_discovery_frames_dropped_when_configured() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let topology = StaticTopology::default();
        let config = BootstrapConfig {
            bootstrap_switch_id: Some(sw("SW-0")),
            ignore_discovery_frames: true,
            ..Default::default()
        };
        let processor = InbandPacketProcessor::new(
            &config,
            ApplicationId::new("test.inband"),
            Arc::new(topology),
            programmer,
            Handle::current(),
        );

        let lldp = InboundPacket::new("SW-0/1".parse().unwrap(), frame("00:00:00:ff:ff:ff", ether_type::LLDP));
        assert_eq!(processor.handle_packet(&lldp), PacketDisposition::DiscoveryFrameDropped);
        assert_eq!(processor.bootstrap_state().phase(), BootstrapPhase::AwaitingBootstrap);
    }

    #[tokio::test]
    async fn test_discovery_frames_classified_by_default() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let processor = processor(Some("SW-0"), programmer);

        let lldp = InboundPacket::new("SW-0/1".parse().unwrap(), frame("00:00:00:ff:ff:ff", ether_type::LLDP));
        assert_eq!(
            processor.handle_packet(&lldp),
            PacketDisposition::BootstrapLatched(sw("SW-0"))
        );
    }

    #[tokio::test]
    async fn test_unconfigured_bootstrap() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let processor = processor(None, programmer);

        assert!(matches!(
            processor.configured_bootstrap_switch(),
            Err(InbandError::UnknownBootstrapSwitch)
        ));
        assert_eq!(
            processor.handle_packet(&request("SW-0/3")),
            PacketDisposition::AwaitingBootstrap
        );
        assert_eq!(processor.stats().ignored_before_bootstrap, 1);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let programmer = Arc::new(LoggingFlowProgrammer::new());
        let processor = processor(Some("SW-0"), programmer);
        processor.handle_packet(&request("SW-0/3"));

        processor.reset();
        assert_eq!(processor.bootstrap_state().phase(), BootstrapPhase::AwaitingBootstrap);
        assert!(processor.registry().is_empty());
    }
}
