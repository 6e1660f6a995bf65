//! Software model of an OTG board
//!
//! Backs the `tegra-otg` simulator binary and the crate's tests. Every
//! capability in [`crate::otg::platform`] has a simulated counterpart here.

mod hw;
mod script;
mod usb;

pub use hw::{SimClock, SimIrqController, SimWakeupRegister};
pub use script::{demo_script, load_script, run_script, ScriptStep};
pub use usb::{SimGadget, SimHostController};

use std::sync::Arc;

use crate::otg::{IrqReturn, PlatformResources};

/// IRQ line the simulated board wires the wakeup block to
pub const SIM_IRQ: u32 = 52;

/// A board with one OTG port
pub struct SimBoard {
    pub register: Arc<SimWakeupRegister>,
    pub clock: Arc<SimClock>,
    pub irq_controller: Arc<SimIrqController>,
    pub host: Arc<SimHostController>,
    pub gadget: Arc<SimGadget>,
    pub irq: u32,
}

impl SimBoard {
    /// Board whose wakeup register starts at `initial_wakeup`
    pub fn new(initial_wakeup: u32) -> Self {
        Self {
            register: Arc::new(SimWakeupRegister::new(initial_wakeup)),
            clock: Arc::new(SimClock::new()),
            irq_controller: Arc::new(SimIrqController::new()),
            host: Arc::new(SimHostController::new()),
            gadget: Arc::new(SimGadget::new("sim-gadget")),
            irq: SIM_IRQ,
        }
    }

    /// Resources to hand to probe
    pub fn resources(&self) -> PlatformResources {
        PlatformResources {
            clock: Some(self.clock.clone()),
            regs: Some(self.register.clone()),
            irq_controller: self.irq_controller.clone(),
            host: self.host.clone(),
            overrides: None,
            events: None,
            registry: None,
        }
    }

    /// Move the cable and raise the interrupt if the register latched one
    pub fn plug(&self, cable_id_present: bool, vbus_present: bool) -> Option<IrqReturn> {
        if self.register.set_lines(cable_id_present, vbus_present) {
            self.irq_controller.fire(self.irq)
        } else {
            None
        }
    }
}
