//! IPv4 prefix type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 prefix in CIDR notation (e.g. `10.0.0.7/32`).
///
/// The address is kept as given; host bits are not masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// Creates a new prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix_len` exceeds 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{}/{}: prefix length exceeds 32",
                address, prefix_len
            )));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Single-host prefix (`/32`).
    pub const fn host(address: Ipv4Addr) -> Self {
        Self {
            address,
            prefix_len: 32,
        }
    }

}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIpPrefix(s.to_string());

        match s.split_once('/') {
            Some((addr, len)) => {
                let address = addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
                let prefix_len = len.parse::<u8>().map_err(|_| invalid())?;
                Self::new(address, prefix_len)
            }
            None => s.parse::<Ipv4Addr>().map(Self::host).map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> String {
        prefix.to_string()
    }
}
