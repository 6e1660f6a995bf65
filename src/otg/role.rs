//! Role resolver
//!
//! Pure mapping from the previous role and the current signals to the role the
//! port should move to. Side effects live in the transition engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::regs::InterruptMask;
use super::signal::SignalState;

/// OTG port role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtgRole {
    /// Before the device has been probed
    #[default]
    #[serde(rename = "undefined")]
    Undefined,
    /// Acting as USB host ("A" device)
    #[serde(rename = "a_host")]
    Host,
    /// Acting as USB peripheral ("B" device)
    #[serde(rename = "b_peripheral")]
    Peripheral,
    /// Idle, neither host nor peripheral
    #[serde(rename = "a_suspend")]
    Suspended,
}

impl OtgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Host => "a_host",
            Self::Peripheral => "b_peripheral",
            Self::Suspended => "a_suspend",
        }
    }
}

impl fmt::Display for OtgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the target role, or `None` when the port should stay where it is
///
/// * Cable-ID absent: `Host`, except from `Peripheral`, which has to settle in
///   `Suspended` first.
/// * Cable-ID present: `Peripheral` when VBUS is up and the port is not a host,
///   otherwise `Suspended`.
/// * A pending VBUS-class event on a non-host port then decides between
///   `Peripheral` and `Suspended` on VBUS alone.
///
/// Total and deterministic; never yields `Undefined`.
pub fn resolve(previous: OtgRole, signals: SignalState, pending: InterruptMask) -> Option<OtgRole> {
    let mut target = if !signals.cable_id_present {
        if previous == OtgRole::Peripheral {
            OtgRole::Suspended
        } else {
            OtgRole::Host
        }
    } else if signals.vbus_present && previous != OtgRole::Host {
        OtgRole::Peripheral
    } else {
        OtgRole::Suspended
    };

    if previous != OtgRole::Host && pending.vbus_pending {
        target = if signals.vbus_present {
            OtgRole::Peripheral
        } else {
            OtgRole::Suspended
        };
    }

    (target != previous).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otg::signal::compute_active_interrupts;

    const ROLES: [OtgRole; 4] = [
        OtgRole::Undefined,
        OtgRole::Host,
        OtgRole::Peripheral,
        OtgRole::Suspended,
    ];

    fn signal_pairs() -> impl Iterator<Item = SignalState> {
        [(false, false), (false, true), (true, false), (true, true)]
            .into_iter()
            .map(|(id, vbus)| SignalState::new(id, vbus))
    }

    fn pending_for(signals: SignalState) -> InterruptMask {
        compute_active_interrupts(
            signals,
            InterruptMask {
                id_enabled: true,
                vbus_enabled: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_total_and_never_undefined() {
        for previous in ROLES {
            for signals in signal_pairs() {
                for id_pending in [false, true] {
                    for vbus_pending in [false, true] {
                        let pending = InterruptMask {
                            id_pending,
                            vbus_pending,
                            ..Default::default()
                        };
                        let first = resolve(previous, signals, pending);
                        assert_eq!(first, resolve(previous, signals, pending));
                        assert_ne!(first, Some(OtgRole::Undefined));
                        assert_ne!(first, Some(previous));
                    }
                }
            }
        }
    }

    #[test]
    fn test_no_direct_host_peripheral_swap() {
        for signals in signal_pairs() {
            let pending = pending_for(signals);
            assert_ne!(
                resolve(OtgRole::Peripheral, signals, pending),
                Some(OtgRole::Host)
            );
            assert_ne!(
                resolve(OtgRole::Host, signals, pending),
                Some(OtgRole::Peripheral)
            );
        }
    }

    #[test]
    fn test_suspended_to_host() {
        let signals = SignalState::new(false, true);
        assert_eq!(
            resolve(OtgRole::Suspended, signals, pending_for(signals)),
            Some(OtgRole::Host)
        );
    }

    #[test]
    fn test_host_cable_reattached_goes_suspended() {
        let signals = SignalState::new(true, true);
        assert_eq!(
            resolve(OtgRole::Host, signals, pending_for(signals)),
            Some(OtgRole::Suspended)
        );
    }

    #[test]
    fn test_suspended_to_peripheral() {
        let signals = SignalState::new(true, true);
        assert_eq!(
            resolve(OtgRole::Suspended, signals, pending_for(signals)),
            Some(OtgRole::Peripheral)
        );
    }

    #[test]
    fn test_peripheral_to_host_passes_suspended() {
        let signals = SignalState::new(false, false);
        assert_eq!(
            resolve(OtgRole::Peripheral, signals, pending_for(signals)),
            Some(OtgRole::Suspended)
        );
        assert_eq!(
            resolve(OtgRole::Suspended, signals, pending_for(signals)),
            Some(OtgRole::Host)
        );
    }

    #[test]
    fn test_vbus_drop_suspends_peripheral() {
        let signals = SignalState::new(true, false);
        let pending = InterruptMask {
            vbus_pending: true,
            ..Default::default()
        };
        assert_eq!(
            resolve(OtgRole::Peripheral, signals, pending),
            Some(OtgRole::Suspended)
        );
    }

    #[test]
    fn test_repeated_state_is_no_change() {
        let signals = SignalState::new(true, true);
        assert_eq!(resolve(OtgRole::Peripheral, signals, pending_for(signals)), None);
        let signals = SignalState::new(false, false);
        assert_eq!(resolve(OtgRole::Host, signals, pending_for(signals)), None);
        let signals = SignalState::new(true, false);
        assert_eq!(resolve(OtgRole::Suspended, signals, pending_for(signals)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(OtgRole::Host.to_string(), "a_host");
        assert_eq!(OtgRole::Peripheral.to_string(), "b_peripheral");
        assert_eq!(OtgRole::Suspended.to_string(), "a_suspend");
    }

    #[test]
    fn test_serde_names_match_display() {
        for role in ROLES {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.to_string());
            let back: OtgRole = serde_json::from_value(json).unwrap();
            assert_eq!(back, role);
        }
    }
}
