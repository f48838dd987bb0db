//! Common network types for the SONiC in-band management plane.
//!
//! This crate provides type-safe representations of the primitives shared
//! between the in-band manager and its collaborators:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Prefix`]: IPv4 network prefixes (CIDR notation)
//! - [`SwitchId`], [`PortNumber`], [`ConnectPoint`]: attachment points
//! - [`Link`], [`Path`]: hop-by-hop routes between two switches

mod ip;
mod mac;
mod topology;

pub use ip::Ipv4Prefix;
pub use mac::MacAddress;
pub use topology::{ConnectPoint, Link, Path, PortNumber, SwitchId};

/// Common error type for parsing and construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid switch identifier: {0:?}")]
    InvalidSwitchId(String),

    #[error("invalid port number: {0}")]
    InvalidPortNumber(String),

    #[error("invalid connect point (expected <switch>/<port>): {0}")]
    InvalidConnectPoint(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
