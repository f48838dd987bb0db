//! Switch, port and path identifiers.
//!
//! A [`ConnectPoint`] names one side of a link, written `<switch>/<port>`
//! (e.g. `of:0000000000000011/3`). A [`Path`] is a non-empty chain of
//! [`Link`]s where each link starts on the switch the previous one ended on.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a network element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SwitchId(String);

impl SwitchId {
    /// Creates a switch identifier.
    ///
    /// # Errors
    ///
    /// Identifiers must be non-empty and must not contain whitespace or `/`
    /// (the connect point separator).
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidSwitchId(id));
        }
        Ok(SwitchId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SwitchId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SwitchId::new(s)
    }
}

impl TryFrom<String> for SwitchId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        SwitchId::new(s)
    }
}

impl From<SwitchId> for String {
    fn from(id: SwitchId) -> String {
        id.0
    }
}

/// Port number, unique within one switch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PortNumber(u32);

impl PortNumber {
    pub const fn new(port: u32) -> Self {
        PortNumber(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(PortNumber)
            .map_err(|_| ParseError::InvalidPortNumber(s.to_string()))
    }
}

impl From<u32> for PortNumber {
    fn from(port: u32) -> Self {
        PortNumber(port)
    }
}

/// A (switch, port) attachment point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectPoint {
    switch: SwitchId,
    port: PortNumber,
}

impl ConnectPoint {
    pub fn new(switch: SwitchId, port: PortNumber) -> Self {
        Self { switch, port }
    }

    pub fn switch(&self) -> &SwitchId {
        &self.switch
    }

    pub fn port(&self) -> PortNumber {
        self.port
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.switch, self.port)
    }
}

impl FromStr for ConnectPoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (switch, port) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidConnectPoint(s.to_string()))?;
        Ok(ConnectPoint::new(switch.parse()?, port.parse()?))
    }
}

impl TryFrom<String> for ConnectPoint {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConnectPoint> for String {
    fn from(cp: ConnectPoint) -> String {
        cp.to_string()
    }
}

/// A unidirectional link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl Link {
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self { src, dst }
    }

    /// The same link traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// One route from a source switch to a destination switch, hop by hop.
///
/// Paths order by their link sequence, which gives callers a stable
/// tie-breaker when several candidates are equally short.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Path {
    links: Vec<Link>,
}

impl Path {
    /// Builds a path from its links.
    ///
    /// # Errors
    ///
    /// Fails if `links` is empty or if a link does not start on the switch
    /// where the previous link ended.
    pub fn new(links: Vec<Link>) -> Result<Self, ParseError> {
        if links.is_empty() {
            return Err(ParseError::InvalidPath("path has no links".to_string()));
        }
        for pair in links.windows(2) {
            if pair[0].dst.switch() != pair[1].src.switch() {
                return Err(ParseError::InvalidPath(format!(
                    "link {} does not continue from {}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Self { links })
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Number of links (always at least one).
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Connect point where the path leaves its source switch.
    pub fn src(&self) -> &ConnectPoint {
        &self.links[0].src
    }

    /// Connect point where the path enters its destination switch.
    pub fn dst(&self) -> &ConnectPoint {
        &self.links[self.links.len() - 1].dst
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.src().switch())?;
        for link in &self.links {
            write!(f, " -> {}", link.dst.switch())?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawPath {
            links: Vec<Link>,
        }

        let raw = RawPath::deserialize(deserializer)?;
        Path::new(raw.links).map_err(serde::de::Error::custom)
    }
}
