//! In-band management bootstrap for SONiC fabrics.
//!
//! inbandmgrd gives switches without an out-of-band management network a
//! control channel through the data plane:
//!
//! - Record every switch connect point a packet arrives on
//! - Classify in-band discovery requests by destination MAC
//! - Latch the bootstrap switch directly attached to the controller
//! - For every remote switch, install an up-path rule (remote → controller)
//!   and per-hop down-path rules (controller → remote)
//!
//! All rules are owned by the configured application and are withdrawn when
//! the manager deactivates.

pub mod bootstrap;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod installer;
pub mod logging;
pub mod manager;
pub mod packet;
pub mod path;
pub mod processor;
pub mod registry;
pub mod topology;

pub use bootstrap::{BootstrapDetector, BootstrapEvent, BootstrapPhase, BootstrapState};
pub use capture::{ReplaySummary, replay};
pub use classifier::{IN_BAND_DISCOVERY_MAC, PacketClassifier};
pub use config::{InbandConfig, LogFormat};
pub use dispatch::{PacketDispatcher, PacketProcessor, PacketService};
pub use error::{InbandError, Result};
pub use flow::{
    ApplicationId, Criterion, FlowProgrammer, ForwardingFlag, ForwardingObjective, Instruction,
    LoggingFlowProgrammer, TrafficSelector, TrafficTreatment,
};
pub use installer::{RuleInstaller, RulePolicy};
pub use logging::init_logging;
pub use manager::InbandMgr;
pub use packet::{EthernetFrame, InboundPacket, Ipv4Header};
pub use path::{PathResolver, select_path};
pub use processor::{InbandPacketProcessor, PacketDisposition, ProcessorStats, ProcessorStatsSnapshot};
pub use registry::SwitchRegistry;
pub use topology::{StaticTopology, TopologyProvider, TopologySnapshot};
