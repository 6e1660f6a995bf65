//! Signal reader
//!
//! Turns a raw wakeup register value into the two monitored signals, honoring
//! software overrides, and derives which interrupt source the signals imply.

use super::regs::{InterruptMask, USB_ID_STATUS, USB_VBUS_STATUS};
use crate::config::OverrideConfig;

/// Cable-ID and VBUS line state
///
/// `cable_id_present` follows the ID line: it is high when no "A" plug is
/// inserted, so `false` means the host-capable end of an OTG cable is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalState {
    pub cable_id_present: bool,
    pub vbus_present: bool,
}

impl SignalState {
    pub fn new(cable_id_present: bool, vbus_present: bool) -> Self {
        Self {
            cable_id_present,
            vbus_present,
        }
    }
}

/// Derive the signal pair from a raw register value
///
/// An enabled override wins over the physical bit. Pure; never touches hardware.
pub fn read_signals(raw: u32, overrides: &OverrideConfig) -> SignalState {
    SignalState {
        cable_id_present: overrides
            .cable_id()
            .unwrap_or(raw & USB_ID_STATUS != 0),
        vbus_present: overrides.vbus().unwrap_or(raw & USB_VBUS_STATUS != 0),
    }
}

/// Decide which interrupt source the current signals represent
///
/// Cable present with VBUS is a VBUS-class event, a missing cable-ID is an
/// ID-class event, never both. Cable present without VBUS marks nothing
/// pending. Enable bits are carried over from `enable_mask` unchanged.
pub fn compute_active_interrupts(
    signals: SignalState,
    enable_mask: InterruptMask,
) -> InterruptMask {
    let (id_pending, vbus_pending) = match (signals.cable_id_present, signals.vbus_present) {
        (true, true) => (false, true),
        (false, _) => (true, false),
        (true, false) => (false, false),
    };

    InterruptMask {
        id_enabled: enable_mask.id_enabled,
        vbus_enabled: enable_mask.vbus_enabled,
        id_pending,
        vbus_pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalOverride;

    fn all_enabled() -> InterruptMask {
        InterruptMask {
            id_enabled: true,
            vbus_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_read_raw_bits() {
        let none = OverrideConfig::default();
        assert_eq!(read_signals(0, &none), SignalState::new(false, false));
        assert_eq!(read_signals(USB_ID_STATUS, &none), SignalState::new(true, false));
        assert_eq!(
            read_signals(USB_ID_STATUS | USB_VBUS_STATUS, &none),
            SignalState::new(true, true)
        );
    }

    #[test]
    fn test_override_wins() {
        let overrides = OverrideConfig {
            cable_id: SignalOverride::forced(false),
            vbus: SignalOverride::forced(true),
        };
        assert_eq!(read_signals(USB_ID_STATUS, &overrides), SignalState::new(false, true));
    }

    #[test]
    fn test_disabled_override_ignored() {
        let overrides = OverrideConfig {
            cable_id: SignalOverride {
                enabled: false,
                value: false,
            },
            vbus: SignalOverride::default(),
        };
        assert_eq!(
            read_signals(USB_ID_STATUS | USB_VBUS_STATUS, &overrides),
            SignalState::new(true, true)
        );
    }

    #[test]
    fn test_vbus_class_event() {
        let mask = compute_active_interrupts(SignalState::new(true, true), all_enabled());
        assert!(mask.vbus_pending);
        assert!(!mask.id_pending);
        assert!(mask.any_fired());
    }

    #[test]
    fn test_id_class_event() {
        for vbus in [false, true] {
            let mask = compute_active_interrupts(SignalState::new(false, vbus), all_enabled());
            assert!(mask.id_pending);
            assert!(!mask.vbus_pending);
        }
    }

    #[test]
    fn test_cable_without_vbus_marks_nothing() {
        let enable_sets = [
            InterruptMask::default(),
            all_enabled(),
            InterruptMask {
                id_pending: true,
                vbus_pending: true,
                ..all_enabled()
            },
        ];
        for enables in enable_sets {
            let mask = compute_active_interrupts(SignalState::new(true, false), enables);
            assert!(!mask.any_pending());
            assert!(!mask.any_fired());
        }
    }

    #[test]
    fn test_disabled_source_does_not_fire() {
        let enables = InterruptMask {
            id_enabled: true,
            ..Default::default()
        };
        let mask = compute_active_interrupts(SignalState::new(true, true), enables);
        assert!(mask.vbus_pending);
        assert!(!mask.any_fired());
    }
}
