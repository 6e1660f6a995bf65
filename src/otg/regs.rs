//! USB PHY wakeup/status register layout
//!
//! A single 32-bit register carries the interrupt enables, the write-one-to-clear
//! interrupt status bits, the live line status and the software override bits
//! for both monitored signals.

pub const USB_ID_INT_EN: u32 = 1 << 0;
pub const USB_ID_INT_STATUS: u32 = 1 << 1;
pub const USB_ID_STATUS: u32 = 1 << 2;
pub const USB_ID_SW_EN: u32 = 1 << 3;
pub const USB_ID_SW_VALUE: u32 = 1 << 4;
pub const USB_ID_PIN_WAKEUP_EN: u32 = 1 << 6;

pub const USB_VBUS_INT_EN: u32 = 1 << 8;
pub const USB_VBUS_INT_STATUS: u32 = 1 << 9;
pub const USB_VBUS_STATUS: u32 = 1 << 10;
pub const USB_VBUS_SW_EN: u32 = 1 << 12;
pub const USB_VBUS_SW_VALUE: u32 = 1 << 13;
pub const USB_VBUS_WAKEUP_EN: u32 = 1 << 30;

/// All write-one-to-clear status bits
pub const USB_INTS: u32 = USB_VBUS_INT_STATUS | USB_ID_INT_STATUS;

/// Interrupt enable and pending bits for the two signal sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptMask {
    pub id_enabled: bool,
    pub vbus_enabled: bool,
    pub id_pending: bool,
    pub vbus_pending: bool,
}

impl InterruptMask {
    /// Decode the enable and status bits of a raw register value
    pub fn from_register(raw: u32) -> Self {
        Self {
            id_enabled: raw & USB_ID_INT_EN != 0,
            vbus_enabled: raw & USB_VBUS_INT_EN != 0,
            id_pending: raw & USB_ID_INT_STATUS != 0,
            vbus_pending: raw & USB_VBUS_INT_STATUS != 0,
        }
    }

    /// Fold the enable and status bits back into `raw`
    pub fn apply_to(&self, raw: u32) -> u32 {
        let mut val = raw & !(USB_ID_INT_EN | USB_VBUS_INT_EN | USB_INTS);
        if self.id_enabled {
            val |= USB_ID_INT_EN;
        }
        if self.vbus_enabled {
            val |= USB_VBUS_INT_EN;
        }
        if self.id_pending {
            val |= USB_ID_INT_STATUS;
        }
        if self.vbus_pending {
            val |= USB_VBUS_INT_STATUS;
        }
        val
    }

    /// Whether any source is pending at all
    pub fn any_pending(&self) -> bool {
        self.id_pending || self.vbus_pending
    }

    /// Whether any source is both enabled and pending
    pub fn any_fired(&self) -> bool {
        (self.id_enabled && self.id_pending) || (self.vbus_enabled && self.vbus_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_decode() {
        let mask = InterruptMask::from_register(USB_ID_INT_EN | USB_VBUS_INT_STATUS | USB_ID_STATUS);
        assert!(mask.id_enabled);
        assert!(!mask.vbus_enabled);
        assert!(!mask.id_pending);
        assert!(mask.vbus_pending);
        assert!(mask.any_pending());
        assert!(!mask.any_fired());
    }

    #[test]
    fn test_mask_apply_keeps_other_bits() {
        let raw = USB_ID_STATUS | USB_VBUS_WAKEUP_EN | USB_ID_INT_STATUS;
        let mask = InterruptMask {
            id_enabled: true,
            vbus_enabled: true,
            id_pending: false,
            vbus_pending: true,
        };
        let val = mask.apply_to(raw);
        assert_eq!(
            val,
            USB_ID_STATUS | USB_VBUS_WAKEUP_EN | USB_ID_INT_EN | USB_VBUS_INT_EN | USB_VBUS_INT_STATUS
        );
        assert_eq!(InterruptMask::from_register(val), mask);
    }

    #[test]
    fn test_bits_are_distinct() {
        let bits = [
            USB_ID_INT_EN,
            USB_ID_INT_STATUS,
            USB_ID_STATUS,
            USB_ID_SW_EN,
            USB_ID_SW_VALUE,
            USB_ID_PIN_WAKEUP_EN,
            USB_VBUS_INT_EN,
            USB_VBUS_INT_STATUS,
            USB_VBUS_STATUS,
            USB_VBUS_SW_EN,
            USB_VBUS_SW_VALUE,
            USB_VBUS_WAKEUP_EN,
        ];
        let combined = bits.iter().fold(0u32, |acc, b| {
            assert_eq!(acc & b, 0);
            acc | b
        });
        assert_eq!(combined.count_ones() as usize, bits.len());
    }
}
