//! Inbound packet representation.
//!
//! Frames arrive already parsed by the packet source; the manager only needs
//! the Ethernet header and, when present, the IPv4 header.

use serde::{Deserialize, Serialize};
use sonic_types::{ConnectPoint, MacAddress, SwitchId};
use std::net::Ipv4Addr;

/// EtherType values the manager matches on or filters.
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const LLDP: u16 = 0x88cc;
    /// Big Switch Networks discovery frames.
    pub const BSN: u16 = 0x8942;
}

/// IP protocol numbers.
pub mod ip_protocol {
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// Parsed IPv4 header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// Parsed Ethernet frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetFrame {
    pub src: MacAddress,
    pub dst: MacAddress,
    pub ether_type: u16,
    /// Present when `ether_type` is IPv4 and the payload parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Header>,
}

/// A received frame with its point of arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundPacket {
    pub received_from: ConnectPoint,
    pub frame: EthernetFrame,
}

impl InboundPacket {
    pub fn new(received_from: ConnectPoint, frame: EthernetFrame) -> Self {
        Self {
            received_from,
            frame,
        }
    }

    /// Switch the packet arrived on.
    pub fn switch(&self) -> &SwitchId {
        self.received_from.switch()
    }
}
