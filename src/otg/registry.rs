//! Registry of probed OTG devices
//!
//! Lets subsystems without a device handle (charger drivers, PMIC code) ask for
//! a VBUS recheck by device name. Devices register at probe and unregister at
//! remove; the registry only holds weak references.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

use super::device::OtgDevice;
use crate::error::{OtgError, Result};

#[derive(Default)]
pub struct OtgRegistry {
    devices: RwLock<HashMap<String, Weak<OtgDevice>>>,
}

impl OtgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device; a live device with the same name is a configuration error
    pub fn register(&self, device: &Arc<OtgDevice>) -> Result<()> {
        let mut devices = self.devices.write();
        if let Some(existing) = devices.get(device.name()) {
            if existing.strong_count() > 0 {
                return Err(OtgError::Config(format!(
                    "OTG device {} already registered",
                    device.name()
                )));
            }
        }
        devices.insert(device.name().to_string(), Arc::downgrade(device));
        debug!("OTG device {} registered", device.name());
        Ok(())
    }

    pub fn unregister(&self, name: &str) {
        if self.devices.write().remove(name).is_some() {
            debug!("OTG device {} unregistered", name);
        }
    }

    /// Look up a live device
    pub fn get(&self, name: &str) -> Option<Arc<OtgDevice>> {
        self.devices.read().get(name).and_then(Weak::upgrade)
    }

    /// Names of live devices, sorted
    pub fn names(&self) -> Vec<String> {
        let devices = self.devices.read();
        let mut names: Vec<String> = devices
            .iter()
            .filter(|(_, device)| device.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Request a VBUS recheck on one device
    pub fn request_vbus_recheck(&self, name: &str) -> Result<()> {
        let device = self
            .get(name)
            .ok_or_else(|| OtgError::NotFound(name.to_string()))?;
        device.request_vbus_recheck();
        Ok(())
    }

    /// Request a VBUS recheck on every live device, returning how many were asked
    pub fn request_vbus_recheck_all(&self) -> usize {
        let devices: Vec<Arc<OtgDevice>> = self
            .devices
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for device in &devices {
            device.request_vbus_recheck();
        }
        devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OtgPlatformConfig;
    use crate::otg::regs::USB_ID_STATUS;
    use crate::sim::SimBoard;

    fn config(name: &str) -> OtgPlatformConfig {
        OtgPlatformConfig {
            name: name.to_string(),
            irq: Some(52),
            ..Default::default()
        }
    }

    fn probe_into(
        registry: &Arc<OtgRegistry>,
        board: &SimBoard,
        name: &str,
    ) -> Result<Arc<OtgDevice>> {
        let mut resources = board.resources();
        resources.registry = Some(registry.clone());
        OtgDevice::probe(Some(config(name)), resources)
    }

    #[tokio::test]
    async fn test_register_on_probe_unregister_on_remove() {
        let registry = Arc::new(OtgRegistry::new());
        let board = SimBoard::new(USB_ID_STATUS);
        let device = probe_into(&registry, &board, "usb0").unwrap();

        assert_eq!(registry.names(), vec!["usb0".to_string()]);
        assert!(registry.get("usb0").is_some());

        device.remove().await;
        assert!(registry.get("usb0").is_none());
        assert!(matches!(
            registry.request_vbus_recheck("usb0"),
            Err(OtgError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = Arc::new(OtgRegistry::new());
        let board_a = SimBoard::new(USB_ID_STATUS);
        let board_b = SimBoard::new(USB_ID_STATUS);
        let device = probe_into(&registry, &board_a, "usb0").unwrap();

        let err = probe_into(&registry, &board_b, "usb0").err().unwrap();
        assert!(matches!(err, OtgError::Config(_)));
        // Failed probe gave everything back
        assert!(!board_b.irq_controller.is_requested(52));
        assert_eq!(board_b.clock.refcount(), 0);

        device.remove().await;
    }

    #[tokio::test]
    async fn test_recheck_by_name() {
        let registry = Arc::new(OtgRegistry::new());
        let board = SimBoard::new(USB_ID_STATUS);
        let device = probe_into(&registry, &board, "usb0").unwrap();
        device.disable_clk();

        registry.request_vbus_recheck("usb0").unwrap();
        device.flush_work().await;
        assert!(device.status().clock_enabled);

        device.disable_clk();
        assert_eq!(registry.request_vbus_recheck_all(), 1);
        device.flush_work().await;
        assert!(device.status().clock_enabled);

        device.remove().await;
    }

    #[tokio::test]
    async fn test_dropped_device_is_not_live() {
        let registry = Arc::new(OtgRegistry::new());
        let board = SimBoard::new(USB_ID_STATUS);
        let device = probe_into(&registry, &board, "usb0").unwrap();
        drop(device);

        assert!(registry.names().is_empty());
        assert_eq!(registry.request_vbus_recheck_all(), 0);
        // A stale entry does not block a new probe under the same name
        let device = probe_into(&registry, &board, "usb0").unwrap();
        device.remove().await;
    }
}
