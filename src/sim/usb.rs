//! Simulated host controller and gadget

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::info;

use crate::error::{OtgError, Result};
use crate::otg::{Gadget, HostController, HostHandle};

/// Host controller that tracks running instances
#[derive(Default)]
pub struct SimHostController {
    next_id: AtomicU32,
    running: Mutex<HashSet<u32>>,
    starts: AtomicU32,
    stops: AtomicU32,
    fail_start: AtomicBool,
}

impl SimHostController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful starts so far
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::Acquire)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::Acquire)
    }

    /// Instances currently running
    pub fn running(&self) -> usize {
        self.running.lock().len()
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Release);
    }
}

#[async_trait]
impl HostController for SimHostController {
    async fn start(&self) -> Result<HostHandle> {
        if self.fail_start.load(Ordering::Acquire) {
            return Err(OtgError::Host("sim host controller failed to start".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.running.lock().insert(id);
        self.starts.fetch_add(1, Ordering::AcqRel);
        info!("sim: host controller {} up", id);
        Ok(HostHandle(id))
    }

    async fn stop(&self, handle: HostHandle) -> Result<()> {
        if !self.running.lock().remove(&handle.0) {
            return Err(OtgError::Host(format!(
                "host controller {} is not running",
                handle.0
            )));
        }
        self.stops.fetch_add(1, Ordering::AcqRel);
        info!("sim: host controller {} down", handle.0);
        Ok(())
    }
}

/// Gadget that records VBUS notifications
pub struct SimGadget {
    name: String,
    connected: AtomicBool,
    connects: AtomicU32,
    disconnects: AtomicU32,
}

impl SimGadget {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::Acquire)
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Gadget for SimGadget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn vbus_connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        self.connects.fetch_add(1, Ordering::AcqRel);
        info!("sim: gadget {} sees VBUS", self.name);
        Ok(())
    }

    async fn vbus_disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.disconnects.fetch_add(1, Ordering::AcqRel);
        info!("sim: gadget {} lost VBUS", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_start_stop() {
        let host = SimHostController::new();
        let a = host.start().await.unwrap();
        let b = host.start().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(host.running(), 2);

        host.stop(a).await.unwrap();
        assert!(host.stop(a).await.is_err());
        assert_eq!(host.running(), 1);
        assert_eq!(host.stops(), 1);
    }

    #[tokio::test]
    async fn test_host_start_failure() {
        let host = SimHostController::new();
        host.set_fail_start(true);
        assert!(matches!(host.start().await, Err(OtgError::Host(_))));
        assert_eq!(host.starts(), 0);
    }

    #[tokio::test]
    async fn test_gadget_notifications() {
        let gadget = SimGadget::new("g0");
        gadget.vbus_connect().await.unwrap();
        assert!(gadget.is_connected());
        gadget.vbus_disconnect().await.unwrap();
        assert!(!gadget.is_connected());
        assert_eq!((gadget.connects(), gadget.disconnects()), (1, 1));
    }
}
