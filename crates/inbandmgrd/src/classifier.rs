//! In-band request classification.

use crate::packet::{ether_type, InboundPacket};
use sonic_types::MacAddress;

/// Reserved destination address switches use to ask for in-band management.
pub const IN_BAND_DISCOVERY_MAC: MacAddress = MacAddress::new([0x00, 0x00, 0x00, 0xff, 0xff, 0xff]);

/// Decides which inbound packets are in-band control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketClassifier {
    request_mac: MacAddress,
}

impl Default for PacketClassifier {
    fn default() -> Self {
        Self::new(IN_BAND_DISCOVERY_MAC)
    }
}

impl PacketClassifier {
    pub fn new(request_mac: MacAddress) -> Self {
        Self { request_mac }
    }

    /// True iff the destination MAC is the in-band discovery address.
    pub fn is_inband_request(&self, packet: &InboundPacket) -> bool {
        packet.frame.dst == self.request_mac
    }

    /// True for LLDP and BSN topology discovery frames.
    ///
    /// Not part of the in-band test; the processor only consults it when
    /// discovery frames are configured to be dropped.
    pub fn is_control_frame(&self, packet: &InboundPacket) -> bool {
        matches!(packet.frame.ether_type, ether_type::LLDP | ether_type::BSN)
    }
}
