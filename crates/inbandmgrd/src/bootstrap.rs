//! Bootstrap switch detection.
//!
//! The detector starts in [`BootstrapPhase::AwaitingBootstrap`]. The first
//! in-band request that arrives on the configured bootstrap switch latches
//! that switch and moves the detector to [`BootstrapPhase::Bootstrapped`].
//! The latch is a check-and-set under a write lock, so concurrent requests
//! produce exactly one transition.

use crate::error::{InbandError, Result};
use parking_lot::RwLock;
use sonic_types::SwitchId;
use std::fmt;

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    AwaitingBootstrap,
    Bootstrapped,
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingBootstrap => write!(f, "AWAITING_BOOTSTRAP"),
            Self::Bootstrapped => write!(f, "BOOTSTRAPPED"),
        }
    }
}

/// Point-in-time view of the detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapState {
    pub bootstrap_switch: Option<SwitchId>,
}

impl BootstrapState {
    pub fn phase(&self) -> BootstrapPhase {
        match self.bootstrap_switch {
            Some(_) => BootstrapPhase::Bootstrapped,
            None => BootstrapPhase::AwaitingBootstrap,
        }
    }

    pub fn is_established(&self) -> bool {
        self.bootstrap_switch.is_some()
    }
}

/// Outcome of feeding one in-band request to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// This request latched the bootstrap switch.
    Latched(SwitchId),
    /// Request from the bootstrap switch after the latch; nothing to do.
    FromBootstrapSwitch,
    /// Request from a remote switch; control paths should be installed
    /// towards `anchor`.
    Remote { anchor: SwitchId },
    /// Bootstrap not established yet and the request is not from the
    /// bootstrap switch.
    Awaiting,
}

#[derive(Debug)]
pub struct BootstrapDetector {
    configured: Option<SwitchId>,
    latched: RwLock<Option<SwitchId>>,
}

impl BootstrapDetector {
    pub fn new(configured: Option<SwitchId>) -> Self {
        Self {
            configured,
            latched: RwLock::new(None),
        }
    }

    /// The configured bootstrap switch.
    ///
    /// Without one the detector can never leave `AwaitingBootstrap`.
    pub fn configured(&self) -> Result<&SwitchId> {
        self.configured
            .as_ref()
            .ok_or(InbandError::UnknownBootstrapSwitch)
    }

    pub fn state(&self) -> BootstrapState {
        BootstrapState {
            bootstrap_switch: self.latched.read().clone(),
        }
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.state().phase()
    }

    /// Feeds an in-band request that arrived on `origin`.
    pub fn observe(&self, origin: &SwitchId) -> BootstrapEvent {
        if let Some(anchor) = self.latched.read().as_ref() {
            return Self::after_latch(anchor, origin);
        }

        if self.configured.as_ref() != Some(origin) {
            return BootstrapEvent::Awaiting;
        }

        let mut latched = self.latched.write();
        match latched.as_ref() {
            // Another request won the race between our read and write.
            Some(anchor) => Self::after_latch(anchor, origin),
            None => {
                *latched = Some(origin.clone());
                BootstrapEvent::Latched(origin.clone())
            }
        }
    }

    fn after_latch(anchor: &SwitchId, origin: &SwitchId) -> BootstrapEvent {
        if anchor == origin {
            BootstrapEvent::FromBootstrapSwitch
        } else {
            BootstrapEvent::Remote {
                anchor: anchor.clone(),
            }
        }
    }

    /// Returns to `AwaitingBootstrap`. Used on deactivation.
    pub(crate) fn reset(&self) {
        *self.latched.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    fn sw(id: &str) -> SwitchId {
        id.parse().unwrap()
    }

    #[test]
    fn test_initial_state() {
        let detector = BootstrapDetector::new(Some(sw("SW-0")));
        assert_eq!(detector.phase(), BootstrapPhase::AwaitingBootstrap);
        assert_eq!(detector.state().bootstrap_switch, None);
        assert_eq!(detector.configured().unwrap(), &sw("SW-0"));
    }

    #[test]
    fn test_latch_on_bootstrap_switch() {
        let detector = BootstrapDetector::new(Some(sw("SW-0")));

        assert_eq!(detector.observe(&sw("SW-0")), BootstrapEvent::Latched(sw("SW-0")));
        assert_eq!(detector.phase(), BootstrapPhase::Bootstrapped);
        assert_eq!(detector.state().bootstrap_switch, Some(sw("SW-0")));

        assert_eq!(detector.observe(&sw("SW-0")), BootstrapEvent::FromBootstrapSwitch);
    }

    #[test]
    fn test_remote_before_latch_is_ignored() {
        let detector = BootstrapDetector::new(Some(sw("SW-0")));

        assert_eq!(detector.observe(&sw("SW-7")), BootstrapEvent::Awaiting);
        assert_eq!(detector.phase(), BootstrapPhase::AwaitingBootstrap);
    }

    #[test]
    fn test_remote_after_latch() {
        let detector = BootstrapDetector::new(Some(sw("SW-0")));
        detector.observe(&sw("SW-0"));

        assert_eq!(
            detector.observe(&sw("SW-7")),
            BootstrapEvent::Remote { anchor: sw("SW-0") }
        );
    }

    #[test]
    fn test_unconfigured_never_latches() {
        let detector = BootstrapDetector::new(None);

        assert!(matches!(
            detector.configured(),
            Err(InbandError::UnknownBootstrapSwitch)
        ));
        assert_eq!(detector.observe(&sw("SW-0")), BootstrapEvent::Awaiting);
        assert_eq!(detector.phase(), BootstrapPhase::AwaitingBootstrap);
    }

    #[test]
    fn test_concurrent_latch_happens_once() {
        let detector = Arc::new(BootstrapDetector::new(Some(sw("SW-0"))));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let detector = Arc::clone(&detector);
                thread::spawn(move || {
                    (0..100)
                        .filter(|_| matches!(detector.observe(&sw("SW-0")), BootstrapEvent::Latched(_)))
                        .count()
                })
            })
            .collect();

        let latches: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(latches, 1);
        assert_eq!(detector.state().bootstrap_switch, Some(sw("SW-0")));
    }

    #[test]
    fn test_reset() {
        let detector = BootstrapDetector::new(Some(sw("SW-0")));
        detector.observe(&sw("SW-0"));
        detector.reset();
        assert_eq!(detector.phase(), BootstrapPhase::AwaitingBootstrap);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(BootstrapPhase::AwaitingBootstrap.to_string(), "AWAITING_BOOTSTRAP");
        assert_eq!(BootstrapPhase::Bootstrapped.to_string(), "BOOTSTRAPPED");
    }
}
