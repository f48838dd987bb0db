//! Forwarding objectives and the flow programmer interface.
//!
//! A forwarding objective is a declarative match/action entry: a
//! [`TrafficSelector`] of header criteria, a [`TrafficTreatment`] of
//! instructions, a priority and the owning application. The
//! [`FlowProgrammer`] turns objectives into switch flow-table entries; the
//! manager only ever writes through it and never reads rules back.

use crate::error::{InbandError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sonic_types::{Ipv4Prefix, MacAddress, PortNumber, SwitchId};
use std::fmt;
use std::mem;
use tracing::info;

/// Identity of the application that owns installed rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single header match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    EthType(u16),
    EthDst(MacAddress),
    IpProtocol(u8),
    Ipv4Dst(Ipv4Prefix),
    TcpSrc(u16),
    TcpDst(u16),
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EthType(t) => write!(f, "ETH_TYPE:0x{:04x}", t),
            Self::EthDst(mac) => write!(f, "ETH_DST:{}", mac),
            Self::IpProtocol(p) => write!(f, "IP_PROTO:{}", p),
            Self::Ipv4Dst(prefix) => write!(f, "IPV4_DST:{}", prefix),
            Self::TcpSrc(port) => write!(f, "TCP_SRC:{}", port),
            Self::TcpDst(port) => write!(f, "TCP_DST:{}", port),
        }
    }
}

/// Set of header criteria; at most one criterion per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSelector {
    criteria: Vec<Criterion>,
}

impl TrafficSelector {
    pub fn builder() -> SelectorBuilder {
        SelectorBuilder::default()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }
}

impl fmt::Display for TrafficSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.criteria.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Builder for [`TrafficSelector`]. A later match of the same kind replaces
/// the earlier one.
#[derive(Debug, Default)]
pub struct SelectorBuilder {
    criteria: Vec<Criterion>,
}

impl SelectorBuilder {
    fn add(mut self, criterion: Criterion) -> Self {
        let kind = mem::discriminant(&criterion);
        self.criteria.retain(|c| mem::discriminant(c) != kind);
        self.criteria.push(criterion);
        self
    }

    pub fn match_eth_type(self, ether_type: u16) -> Self {
        self.add(Criterion::EthType(ether_type))
    }

    pub fn match_eth_dst(self, mac: MacAddress) -> Self {
        self.add(Criterion::EthDst(mac))
    }

    pub fn match_ip_protocol(self, protocol: u8) -> Self {
        self.add(Criterion::IpProtocol(protocol))
    }

    pub fn match_ipv4_dst(self, prefix: Ipv4Prefix) -> Self {
        self.add(Criterion::Ipv4Dst(prefix))
    }

    pub fn match_tcp_src(self, port: u16) -> Self {
        self.add(Criterion::TcpSrc(port))
    }

    pub fn match_tcp_dst(self, port: u16) -> Self {
        self.add(Criterion::TcpDst(port))
    }

    pub fn build(self) -> TrafficSelector {
        TrafficSelector {
            criteria: self.criteria,
        }
    }
}

/// Action applied to matched traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Output(PortNumber),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(port) => write!(f, "OUTPUT:{}", port),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficTreatment {
    instructions: Vec<Instruction>,
}

impl TrafficTreatment {
    /// Treatment with a single output instruction.
    pub fn output(port: PortNumber) -> Self {
        Self {
            instructions: vec![Instruction::Output(port)],
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// First output port, if any.
    pub fn output_port(&self) -> Option<PortNumber> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Output(port) => Some(*port),
        })
    }
}

impl fmt::Display for TrafficTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.instructions.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// How the flow programmer may place the objective in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardingFlag {
    /// May be placed in any table that can match the selector.
    #[default]
    Versatile,
}

/// A match/action rule submitted to the flow programmer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingObjective {
    pub selector: TrafficSelector,
    pub treatment: TrafficTreatment,
    pub priority: u16,
    pub flag: ForwardingFlag,
    pub app_id: ApplicationId,
    pub permanent: bool,
}

impl ForwardingObjective {
    /// Creates a permanent, versatile objective at priority 0.
    pub fn new(selector: TrafficSelector, treatment: TrafficTreatment, app_id: ApplicationId) -> Self {
        Self {
            selector,
            treatment,
            priority: 0,
            flag: ForwardingFlag::Versatile,
            app_id,
            permanent: true,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Display for ForwardingObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "priority={} selector={} treatment={} app={}",
            self.priority, self.selector, self.treatment, self.app_id
        )
    }
}

/// Programs forwarding objectives onto switches.
#[async_trait]
pub trait FlowProgrammer: Send + Sync {
    /// Installs `objective` on `device`.
    async fn forward(&self, device: &SwitchId, objective: ForwardingObjective) -> Result<()>;

    /// Removes every rule owned by `app_id`, returning how many were removed.
    async fn remove_all_by_owner(&self, app_id: &ApplicationId) -> Result<usize>;
}

/// Flow programmer that records objectives in memory and logs them.
///
/// Used by the daemon in dry-run mode.
#[derive(Debug, Default)]
pub struct LoggingFlowProgrammer {
    installed: Mutex<Vec<(SwitchId, ForwardingObjective)>>,
}

impl LoggingFlowProgrammer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every objective currently installed, in submission order.
    pub fn installed(&self) -> Vec<(SwitchId, ForwardingObjective)> {
        self.installed.lock().clone()
    }

    /// Objectives installed on one device.
    pub fn installed_on(&self, device: &SwitchId) -> Vec<ForwardingObjective> {
        self.installed
            .lock()
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, o)| o.clone())
            .collect()
    }
}

#[async_trait]
impl FlowProgrammer for LoggingFlowProgrammer {
    async fn forward(&self, device: &SwitchId, objective: ForwardingObjective) -> Result<()> {
        if objective.treatment.instructions().is_empty() {
            return Err(InbandError::rule_installation_failed(device, "empty treatment"));
        }
        info!(%device, %objective, "Forwarding objective installed");
        self.installed.lock().push((device.clone(), objective));
        Ok(())
    }

    async fn remove_all_by_owner(&self, app_id: &ApplicationId) -> Result<usize> {
        let mut installed = self.installed.lock();
        let before = installed.len();
        installed.retain(|(_, o)| &o.app_id != app_id);
        let removed = before - installed.len();
        info!(app = %app_id, removed, "Removed forwarding objectives by owner");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ether_type, ip_protocol};
    use pretty_assertions::assert_eq;

    fn sw(id: &str) -> SwitchId {
        id.parse().unwrap()
    }

    #[test]
    fn test_selector_builder_replaces_same_kind() {
        let selector = TrafficSelector::builder()
            .match_tcp_dst(6633)
            .match_ip_protocol(ip_protocol::TCP)
            .match_tcp_dst(6653)
            .build();

        assert_eq!(
            selector.criteria(),
            &[Criterion::TcpDst(6653), Criterion::IpProtocol(ip_protocol::TCP)]
        );
    }

    #[test]
    fn test_selector_display() {
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let prefix: Ipv4Prefix = "10.0.0.7/32".parse().unwrap();
        let selector = TrafficSelector::builder()
            .match_eth_dst(mac)
            .match_eth_type(ether_type::IPV4)
            .match_ipv4_dst(prefix)
            .build();

        assert_eq!(
            selector.to_string(),
            "[ETH_DST:AA:BB:CC:DD:EE:FF, ETH_TYPE:0x0800, IPV4_DST:10.0.0.7/32]"
        );
    }

    #[test]
    fn test_objective_defaults() {
        let objective = ForwardingObjective::new(
            TrafficSelector::default(),
            TrafficTreatment::output(PortNumber::new(3)),
            ApplicationId::new("test"),
        );

        assert_eq!(objective.priority, 0);
        assert_eq!(objective.flag, ForwardingFlag::Versatile);
        assert!(objective.permanent);
        assert_eq!(objective.treatment.output_port(), Some(PortNumber::new(3)));
    }

    #[tokio::test]
    async fn test_logging_programmer_records_and_removes_by_owner() {
        let programmer = LoggingFlowProgrammer::new();
        let ours = ApplicationId::new("ours");
        let theirs = ApplicationId::new("theirs");
        let treatment = TrafficTreatment::output(PortNumber::new(1));

        for app in [&ours, &ours, &theirs] {
            let objective =
                ForwardingObjective::new(TrafficSelector::default(), treatment.clone(), app.clone());
            programmer.forward(&sw("SW-1"), objective).await.unwrap();
        }
        assert_eq!(programmer.installed().len(), 3);

        assert_eq!(programmer.remove_all_by_owner(&ours).await.unwrap(), 2);
        let left = programmer.installed_on(&sw("SW-1"));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].app_id, theirs);
    }

    #[tokio::test]
    async fn test_logging_programmer_rejects_empty_treatment() {
        let programmer = LoggingFlowProgrammer::new();
        let objective = ForwardingObjective::new(
            TrafficSelector::default(),
            TrafficTreatment::default(),
            ApplicationId::new("ours"),
        );

        let err = programmer.forward(&sw("SW-1"), objective).await.unwrap_err();
        assert!(matches!(err, InbandError::RuleInstallationFailed { .. }));
        assert!(programmer.installed().is_empty());
    }
}
