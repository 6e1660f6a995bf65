//! Capabilities the OTG core consumes from the board
//!
//! Register, clock and IRQ access are synchronous and must never block, they
//! are called from the interrupt front end. Host controller and gadget calls
//! may block and are only made from the deferred work context or from callers'
//! own tasks, never while the device lock is held.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::registry::OtgRegistry;
use crate::config::SignalOverrides;
use crate::error::Result;
use crate::events::EventBus;

/// Memory-mapped USB PHY wakeup register
pub trait WakeupRegister: Send + Sync {
    fn read(&self) -> u32;

    /// Interrupt status bits are write-one-to-clear
    fn write(&self, value: u32);
}

/// Clock gating the wakeup block
///
/// Enables are reference counted by the platform; every successful
/// `enable` is matched by exactly one `disable`.
pub trait OtgClock: Send + Sync {
    fn enable(&self) -> Result<()>;
    fn disable(&self);
}

/// Result of running an interrupt handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not ours or carried nothing actionable
    None,
    Handled,
}

/// Interrupt handler registered by the core
pub type IrqHandler = Arc<dyn Fn() -> IrqReturn + Send + Sync>;

/// Interrupt line management
pub trait IrqController: Send + Sync {
    fn request_irq(&self, irq: u32, name: &str, handler: IrqHandler) -> Result<()>;

    /// After this returns the handler is guaranteed not to run again
    fn free_irq(&self, irq: u32);
}

/// Opaque handle of a registered host controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u32);

/// Platform host controller lifecycle
#[async_trait]
pub trait HostController: Send + Sync {
    /// Register and start a host controller instance
    async fn start(&self) -> Result<HostHandle>;

    /// Stop and unregister a previously started instance
    async fn stop(&self, handle: HostHandle) -> Result<()>;
}

/// Peripheral-mode function stack, owned by the gadget driver
#[async_trait]
pub trait Gadget: Send + Sync {
    fn name(&self) -> &str;

    /// Tell the gadget VBUS appeared
    async fn vbus_connect(&self) -> Result<()>;

    /// Tell the gadget VBUS dropped
    async fn vbus_disconnect(&self) -> Result<()>;
}

/// Host bus announced by the host-side driver through `set_host`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBus {
    pub name: String,
    pub bus_num: u32,
}

impl fmt::Display for HostBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (bus {})", self.name, self.bus_num)
    }
}

/// Everything the board hands to probe
///
/// `clock` and `regs` are optional because a board description can lack them;
/// probe fails with a configuration error in that case.
pub struct PlatformResources {
    pub clock: Option<Arc<dyn OtgClock>>,
    pub regs: Option<Arc<dyn WakeupRegister>>,
    pub irq_controller: Arc<dyn IrqController>,
    pub host: Arc<dyn HostController>,
    /// Live overrides; built from the config when absent
    pub overrides: Option<SignalOverrides>,
    pub events: Option<Arc<EventBus>>,
    pub registry: Option<Arc<OtgRegistry>>,
}
