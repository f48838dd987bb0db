//! Error types for the in-band manager.
//!
//! Per-packet errors (`NoPathFound`, `RuleInstallationFailed`,
//! `MissingIpv4Header`) are logged and counted inside the packet processor
//! and never escape to the dispatcher. The remaining variants surface from
//! configuration loading and lifecycle calls.

use sonic_types::{ParseError, SwitchId};
use thiserror::Error;

/// Result type for in-band manager operations.
pub type Result<T> = std::result::Result<T, InbandError>;

/// Errors raised by the in-band manager.
#[derive(Debug, Error)]
pub enum InbandError {
    /// The topology returned no candidate path between two switches.
    #[error("No path found from {src} to {dst}")]
    NoPathFound {
        /// Path source switch.
        src: SwitchId,
        /// Path destination switch.
        dst: SwitchId,
    },

    /// The flow programmer rejected a forwarding objective.
    #[error("Rule installation failed on {device}: {message}")]
    RuleInstallationFailed {
        /// Switch the rule was meant for.
        device: SwitchId,
        /// Reason reported by the programmer.
        message: String,
    },

    /// No bootstrap switch identifier was configured.
    #[error("No bootstrap switch configured; in-band bootstrap cannot complete")]
    UnknownBootstrapSwitch,

    /// A down-path rule needs the requester's IPv4 source address.
    #[error("In-band request from {device} carries no IPv4 header")]
    MissingIpv4Header {
        /// Switch the request arrived on.
        device: SwitchId,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `activate` was called on an active manager.
    #[error("In-band manager is already active")]
    AlreadyActive,

    /// `deactivate` was called on an inactive manager.
    #[error("In-band manager is not active")]
    NotActive,

    /// No tokio runtime is available to run rule submissions.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Identifier or address parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error (packet captures).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InbandError {
    /// Creates a no-path error.
    pub fn no_path(src: &SwitchId, dst: &SwitchId) -> Self {
        Self::NoPathFound {
            src: src.clone(),
            dst: dst.clone(),
        }
    }

    /// Creates a rule installation error.
    pub fn rule_installation_failed(device: &SwitchId, message: impl Into<String>) -> Self {
        Self::RuleInstallationFailed {
            device: device.clone(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sw(id: &str) -> SwitchId {
        id.parse().unwrap()
    }

    #[test]
    fn test_no_path_display() {
        let err = InbandError::no_path(&sw("SW-7"), &sw("SW-0"));
        assert_eq!(err.to_string(), "No path found from SW-7 to SW-0");
    }

    #[test]
    fn test_rule_installation_failed_display() {
        let err = InbandError::rule_installation_failed(&sw("SW-3"), "table full");
        assert_eq!(err.to_string(), "Rule installation failed on SW-3: table full");
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: InbandError = "".parse::<SwitchId>().unwrap_err().into();
        assert!(matches!(err, InbandError::Parse(_)));
    }
}
