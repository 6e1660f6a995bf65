//! Simulated wakeup register, clock and interrupt controller

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::trace;

use crate::error::{OtgError, Result};
use crate::otg::regs::{
    USB_ID_INT_EN, USB_ID_INT_STATUS, USB_ID_STATUS, USB_ID_SW_EN, USB_ID_SW_VALUE, USB_INTS,
    USB_VBUS_INT_EN, USB_VBUS_INT_STATUS, USB_VBUS_STATUS, USB_VBUS_SW_EN, USB_VBUS_SW_VALUE,
};
use crate::otg::{IrqController, IrqHandler, IrqReturn, OtgClock, WakeupRegister};

/// Line status bits are driven by the cable, not by software writes
const LINE_BITS: u32 = USB_ID_STATUS | USB_VBUS_STATUS;

struct RegState {
    /// Everything but the line status bits
    value: u32,
    id_line: bool,
    vbus_line: bool,
}

/// Wakeup register with a physical cable model
///
/// Status bits are write-one-to-clear. A line change latches its status bit
/// when the matching interrupt is enabled. With a software override enabled
/// the line status reads back the override value.
pub struct SimWakeupRegister {
    inner: Mutex<RegState>,
}

impl SimWakeupRegister {
    pub fn new(initial: u32) -> Self {
        Self {
            inner: Mutex::new(RegState {
                value: initial & !LINE_BITS,
                id_line: initial & USB_ID_STATUS != 0,
                vbus_line: initial & USB_VBUS_STATUS != 0,
            }),
        }
    }

    /// Raw contents with the physical line state
    pub fn peek(&self) -> u32 {
        let st = self.inner.lock();
        compose(&st, false)
    }

    /// Overwrite everything, line state included
    pub fn poke(&self, value: u32) {
        let mut st = self.inner.lock();
        st.value = value & !LINE_BITS;
        st.id_line = value & USB_ID_STATUS != 0;
        st.vbus_line = value & USB_VBUS_STATUS != 0;
    }

    /// What the driver sees on a read
    pub fn read_effective(&self) -> u32 {
        let st = self.inner.lock();
        compose(&st, true)
    }

    /// Change the physical lines; returns whether an interrupt was latched
    pub fn set_lines(&self, cable_id_present: bool, vbus_present: bool) -> bool {
        let mut st = self.inner.lock();
        let mut latched = 0;
        if st.id_line != cable_id_present && st.value & USB_ID_INT_EN != 0 {
            latched |= USB_ID_INT_STATUS;
        }
        if st.vbus_line != vbus_present && st.value & USB_VBUS_INT_EN != 0 {
            latched |= USB_VBUS_INT_STATUS;
        }
        st.id_line = cable_id_present;
        st.vbus_line = vbus_present;
        st.value |= latched;
        trace!(
            "sim: lines id={} vbus={} latched={:#x}",
            cable_id_present,
            vbus_present,
            latched
        );
        latched != 0
    }

    /// Latch status bits directly
    pub fn force_status(&self, bits: u32) {
        self.inner.lock().value |= bits & USB_INTS;
    }
}

fn compose(st: &RegState, effective: bool) -> u32 {
    let mut id = st.id_line;
    let mut vbus = st.vbus_line;
    if effective && st.value & USB_ID_SW_EN != 0 {
        id = st.value & USB_ID_SW_VALUE != 0;
    }
    if effective && st.value & USB_VBUS_SW_EN != 0 {
        vbus = st.value & USB_VBUS_SW_VALUE != 0;
    }

    let mut val = st.value;
    if id {
        val |= USB_ID_STATUS;
    }
    if vbus {
        val |= USB_VBUS_STATUS;
    }
    val
}

impl WakeupRegister for SimWakeupRegister {
    fn read(&self) -> u32 {
        self.read_effective()
    }

    fn write(&self, value: u32) {
        let mut st = self.inner.lock();
        let kept = st.value & USB_INTS & !value;
        st.value = (value & !(LINE_BITS | USB_INTS)) | kept;
    }
}

/// Reference counted clock
#[derive(Default)]
pub struct SimClock {
    refcount: AtomicI32,
    fail_enable: AtomicBool,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refcount(&self) -> i32 {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.refcount() > 0
    }

    /// Make subsequent enables fail
    pub fn set_fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::Release);
    }
}

impl OtgClock for SimClock {
    fn enable(&self) -> Result<()> {
        if self.fail_enable.load(Ordering::Acquire) {
            return Err(OtgError::Config("sim clock refused to enable".to_string()));
        }
        self.refcount.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn disable(&self) {
        self.refcount.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Interrupt controller that runs handlers on demand
#[derive(Default)]
pub struct SimIrqController {
    handlers: Mutex<HashMap<u32, IrqHandler>>,
    fail_requests: AtomicBool,
}

impl SimIrqController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self, irq: u32) -> bool {
        self.handlers.lock().contains_key(&irq)
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::Release);
    }

    /// Run the handler of `irq`; `None` if nothing is registered
    pub fn fire(&self, irq: u32) -> Option<IrqReturn> {
        // Handler runs without the table lock so it may free itself
        let handler = self.handlers.lock().get(&irq).cloned()?;
        Some(handler())
    }
}

impl IrqController for SimIrqController {
    fn request_irq(&self, irq: u32, name: &str, handler: IrqHandler) -> Result<()> {
        if self.fail_requests.load(Ordering::Acquire) {
            return Err(OtgError::Irq(format!("sim refused IRQ {} for {}", irq, name)));
        }
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&irq) {
            return Err(OtgError::Irq(format!("IRQ {} already in use", irq)));
        }
        handlers.insert(irq, handler);
        Ok(())
    }

    fn free_irq(&self, irq: u32) {
        self.handlers.lock().remove(&irq);
    }
}
