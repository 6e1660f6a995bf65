//! OTG device aggregate and interrupt front end
//!
//! ```text
//!  IRQ ──► handle_irq ──(lock: read+clear wakeup reg)──► pending int_status
//!                                   │
//!                                   ▼ try_send (capacity 1, coalescing)
//!                          deferred worker task ──► apply_transition
//!                                                     (host / gadget side effects)
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::platform::{
    Gadget, HostBus, HostController, HostHandle, IrqController, IrqHandler, IrqReturn, OtgClock,
    PlatformResources, WakeupRegister,
};
use super::registry::OtgRegistry;
use super::regs::{
    InterruptMask, USB_ID_INT_EN, USB_ID_PIN_WAKEUP_EN, USB_INTS, USB_VBUS_INT_EN,
    USB_VBUS_WAKEUP_EN,
};
use super::role::OtgRole;
use super::signal::{compute_active_interrupts, read_signals};
use crate::config::{OtgPlatformConfig, SignalOverrides};
use crate::error::{OtgError, Result};
use crate::events::{EventBus, OtgEvent};

/// Deferred work bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OtgStats {
    /// Role changes recorded
    pub transitions: u64,
    /// Deferred work invocations queued
    pub work_queued: u64,
    /// Requests folded into an already queued invocation
    pub work_coalesced: u64,
    /// Deferred work invocations executed
    pub work_runs: u64,
}

/// Point-in-time view of a device
#[derive(Debug, Clone, Serialize)]
pub struct OtgStatus {
    pub name: String,
    pub role: OtgRole,
    pub clock_enabled: bool,
    pub host_running: bool,
    pub host_bus: Option<String>,
    pub gadget: Option<String>,
    pub stats: OtgStats,
}

/// State guarded by the device lock
///
/// Critical sections only touch these fields and the wakeup register; host
/// and gadget calls happen after the guard is dropped.
pub(super) struct OtgState {
    pub(super) role: OtgRole,
    /// Status captured by the last interrupt or attach call
    pub(super) int_status: u32,
    /// Next deferred run only re-enables the clock
    pub(super) detect_vbus: bool,
    pub(super) transition_pending: bool,
    /// Sticky clock enable, as opposed to the transient register-access enables
    pub(super) clk_enabled: bool,
    /// Wakeup register contents saved across suspend
    pub(super) saved_wakeup: u32,
    pub(super) host_bus: Option<HostBus>,
    pub(super) gadget: Option<Arc<dyn Gadget>>,
    pub(super) host_handle: Option<HostHandle>,
    pub(super) stats: OtgStats,
}

/// One OTG port
///
/// Created by [`OtgDevice::probe`], torn down by [`OtgDevice::remove`].
pub struct OtgDevice {
    pub(super) name: String,
    irq: u32,
    pub(super) resume_settle: Duration,
    pub(super) regs: Arc<dyn WakeupRegister>,
    pub(super) clock: Arc<dyn OtgClock>,
    irq_controller: Arc<dyn IrqController>,
    pub(super) host: Arc<dyn HostController>,
    pub(super) overrides: SignalOverrides,
    events: Option<Arc<EventBus>>,
    registry: Option<Arc<OtgRegistry>>,
    pub(super) state: Mutex<OtgState>,
    /// Held across a whole transition or suspend so the two never interleave
    pub(super) transition_lock: tokio::sync::Mutex<()>,
    /// Single-slot deferred work queue; `None` once removed
    work_tx: Mutex<Option<mpsc::Sender<()>>>,
    /// Completed deferred runs, for `flush_work`
    work_done: watch::Sender<u64>,
    worker: Mutex<Option<JoinHandle<()>>>,
    irq_requested: AtomicBool,
    removed: AtomicBool,
}

impl OtgDevice {
    /// Acquire resources, register the interrupt and start the deferred worker
    ///
    /// Must be called from within a tokio runtime. On failure everything
    /// acquired so far is released in reverse order.
    pub fn probe(
        config: Option<OtgPlatformConfig>,
        resources: PlatformResources,
    ) -> Result<Arc<Self>> {
        let config =
            config.ok_or_else(|| OtgError::Config("missing OTG platform config".to_string()))?;
        config.validate()?;

        let clock = resources
            .clock
            .ok_or_else(|| OtgError::Config(format!("{}: missing clock", config.name)))?;
        clock.enable().map_err(|e| {
            OtgError::Config(format!("{}: failed to enable clock: {}", config.name, e))
        })?;

        let Some(regs) = resources.regs else {
            clock.disable();
            return Err(OtgError::Config(format!(
                "{}: missing memory resource",
                config.name
            )));
        };

        let Some(irq) = config.irq else {
            clock.disable();
            return Err(OtgError::Config(format!(
                "{}: missing IRQ resource",
                config.name
            )));
        };

        let overrides = resources
            .overrides
            .unwrap_or_else(|| SignalOverrides::new(config.overrides));
        let (work_tx, work_rx) = mpsc::channel(1);
        let (work_done, _) = watch::channel(0);

        let device = Arc::new(Self {
            name: config.name.clone(),
            irq,
            resume_settle: Duration::from_millis(config.resume_settle_ms),
            regs,
            clock,
            irq_controller: resources.irq_controller,
            host: resources.host,
            overrides,
            events: resources.events,
            registry: resources.registry,
            state: Mutex::new(OtgState {
                role: OtgRole::Undefined,
                int_status: 0,
                detect_vbus: false,
                transition_pending: false,
                clk_enabled: true,
                saved_wakeup: 0,
                host_bus: None,
                gadget: None,
                host_handle: None,
                stats: OtgStats::default(),
            }),
            transition_lock: tokio::sync::Mutex::new(()),
            work_tx: Mutex::new(Some(work_tx)),
            work_done,
            worker: Mutex::new(None),
            irq_requested: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        });

        device.state.lock().role = OtgRole::Suspended;

        let weak = Arc::downgrade(&device);
        let handler: IrqHandler = Arc::new(move || match weak.upgrade() {
            Some(device) => device.handle_irq(),
            None => IrqReturn::None,
        });
        if let Err(e) = device
            .irq_controller
            .request_irq(irq, &device.name, handler)
        {
            device.disable_clk();
            return Err(OtgError::Irq(format!(
                "{}: failed to request IRQ {}: {}",
                device.name, irq, e
            )));
        }
        device.irq_requested.store(true, Ordering::Release);

        if let Some(registry) = &device.registry {
            if let Err(e) = registry.register(&device) {
                device.release_irq();
                device.disable_clk();
                return Err(e);
            }
        }

        *device.worker.lock() = Some(spawn_worker(Arc::downgrade(&device), work_rx));

        info!("{}: OTG transceiver probed on IRQ {}", device.name, irq);
        Ok(device)
    }

    /// Free the interrupt, drain the work queue and release the hardware
    ///
    /// Queued deferred work is allowed to finish. A running host controller
    /// is stopped. Calling `remove` twice is a no-op.
    pub async fn remove(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.release_irq();
        if let Some(registry) = &self.registry {
            registry.unregister(&self.name);
        }

        // Closing the sender lets the worker drain and exit
        drop(self.work_tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("{}: OTG worker ended abnormally: {}", self.name, e);
            }
        }

        let handle = self.state.lock().host_handle.take();
        if let Some(handle) = handle {
            if let Err(e) = self.host.stop(handle).await {
                warn!("{}: failed to stop host controller on remove: {}", self.name, e);
            }
        }

        self.disable_clk();
        info!("{}: OTG transceiver removed", self.name);
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current role
    pub fn role(&self) -> OtgRole {
        self.state.lock().role
    }

    /// Live override values shared with the platform layer
    pub fn overrides(&self) -> &SignalOverrides {
        &self.overrides
    }

    /// Snapshot of the device state
    pub fn status(&self) -> OtgStatus {
        let st = self.state.lock();
        OtgStatus {
            name: self.name.clone(),
            role: st.role,
            clock_enabled: st.clk_enabled,
            host_running: st.host_handle.is_some(),
            host_bus: st.host_bus.as_ref().map(|bus| bus.to_string()),
            gadget: st.gadget.as_ref().map(|g| g.name().to_string()),
            stats: st.stats,
        }
    }

    /// Record the host bus and arm the cable-ID interrupt
    pub fn set_host(&self, bus: Option<HostBus>) -> Result<()> {
        self.ensure_present()?;

        let mut st = self.state.lock();
        let Some(bus) = bus else {
            st.host_bus = None;
            info!("{}: host bus unregistered", self.name);
            return Ok(());
        };

        self.with_regs(|regs| {
            let val = (regs.read() & !USB_INTS) | USB_ID_INT_EN | USB_ID_PIN_WAKEUP_EN;
            regs.write(val);
        });
        info!("{}: host bus {} registered", self.name, bus);
        st.host_bus = Some(bus);
        Ok(())
    }

    /// Record the gadget, arm both interrupts and kick off initial detection
    ///
    /// A cable already attached when the gadget registers is picked up here:
    /// the current register contents are evaluated and deferred work is
    /// queued if they imply an event.
    pub fn set_peripheral(&self, gadget: Option<Arc<dyn Gadget>>) -> Result<()> {
        self.ensure_present()?;

        let mut st = self.state.lock();
        let Some(gadget) = gadget else {
            st.gadget = None;
            info!("{}: gadget unregistered", self.name);
            return Ok(());
        };
        info!("{}: gadget {} registered", self.name, gadget.name());
        st.gadget = Some(gadget);

        let val = self.with_regs(|regs| {
            let val = (regs.read() & !USB_INTS)
                | USB_VBUS_INT_EN
                | USB_VBUS_WAKEUP_EN
                | USB_ID_INT_EN
                | USB_ID_PIN_WAKEUP_EN;
            regs.write(val);
            val
        });

        let signals = read_signals(val, &self.overrides.get());
        let active = compute_active_interrupts(signals, InterruptMask::from_register(val));
        if active.any_fired() {
            st.int_status = active.apply_to(val);
            st.detect_vbus = false;
            st.transition_pending = true;
            self.queue_work(&mut st);
        }
        Ok(())
    }

    /// Ask for a clock-recheck-only deferred run
    ///
    /// Used after the platform changed an override value between interrupts.
    /// A recheck never displaces a transition that is already pending.
    pub fn request_vbus_recheck(&self) {
        if self.removed.load(Ordering::Acquire) {
            debug!("{}: VBUS recheck after remove ignored", self.name);
            return;
        }

        let mut st = self.state.lock();
        if st.transition_pending {
            debug!("{}: transition pending, VBUS recheck skipped", self.name);
            return;
        }
        st.detect_vbus = true;
        self.queue_work(&mut st);
    }

    /// Interrupt front end
    ///
    /// Never blocks: reads and clears the wakeup register under the lock and
    /// queues the deferred worker if an enabled source is asserted.
    ///
    /// The decision uses the raw status bits, not the computed mask, so cable
    /// present with VBUS absent still queues a run on this path. That run is
    /// what takes a peripheral back to suspended when VBUS drops.
    /// `set_peripheral` decides on the computed mask instead.
    pub fn handle_irq(&self) -> IrqReturn {
        let raw = {
            let _st = self.state.lock();
            self.with_regs(|regs| {
                let val = regs.read();
                regs.write(val);
                val
            })
        };

        let asserted = InterruptMask::from_register(raw);
        if !asserted.any_fired() {
            return IrqReturn::None;
        }

        let signals = read_signals(raw, &self.overrides.get());
        let active = compute_active_interrupts(signals, asserted);

        let mut st = self.state.lock();
        st.int_status = active.apply_to(raw);
        st.detect_vbus = false;
        st.transition_pending = true;
        debug!(
            "{}: IRQ status {:#010x} id={} vbus={}",
            self.name, raw, signals.cable_id_present, signals.vbus_present
        );
        self.queue_work(&mut st);
        IrqReturn::Handled
    }

    /// Wait until every deferred run queued so far has completed
    pub async fn flush_work(&self) {
        if self.removed.load(Ordering::Acquire) {
            return;
        }
        let target = self.state.lock().stats.work_queued;
        let mut done = self.work_done.subscribe();
        let _ = done.wait_for(|completed| *completed >= target).await;
    }

    fn queue_work(&self, st: &mut OtgState) {
        let tx = self.work_tx.lock();
        let Some(tx) = tx.as_ref() else {
            debug!("{}: work queue closed, request dropped", self.name);
            return;
        };

        match tx.try_send(()) {
            Ok(()) => st.stats.work_queued += 1,
            Err(TrySendError::Full(())) => {
                st.stats.work_coalesced += 1;
                debug!("{}: deferred work already queued, coalescing", self.name);
            }
            Err(TrySendError::Closed(())) => {
                debug!("{}: work queue closed, request dropped", self.name);
            }
        }
    }

    fn ensure_present(&self) -> Result<()> {
        if self.removed.load(Ordering::Acquire) {
            Err(OtgError::DeviceRemoved)
        } else {
            Ok(())
        }
    }

    fn release_irq(&self) {
        if self.irq_requested.swap(false, Ordering::AcqRel) {
            self.irq_controller.free_irq(self.irq);
        }
    }

    /// Take a transient clock reference; `false` if the clock refused
    pub(super) fn clock_get(&self) -> bool {
        match self.clock.enable() {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: failed to enable clock: {}", self.name, e);
                false
            }
        }
    }

    /// Run a register access with the clock held
    pub(super) fn with_regs<R>(&self, f: impl FnOnce(&dyn WakeupRegister) -> R) -> R {
        let clocked = self.clock_get();
        let result = f(self.regs.as_ref());
        if clocked {
            self.clock.disable();
        }
        result
    }

    /// Sticky clock enable
    pub(super) fn enable_clk(&self) {
        let mut st = self.state.lock();
        if st.clk_enabled {
            return;
        }
        match self.clock.enable() {
            Ok(()) => st.clk_enabled = true,
            Err(e) => warn!("{}: failed to enable clock: {}", self.name, e),
        }
    }

    /// Drop the sticky clock enable
    pub(super) fn disable_clk(&self) {
        let mut st = self.state.lock();
        if st.clk_enabled {
            self.clock.disable();
            st.clk_enabled = false;
        }
    }

    pub(super) fn publish(&self, event: OtgEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl Drop for OtgDevice {
    fn drop(&mut self) {
        self.release_irq();
        self.disable_clk();
        debug!("OtgDevice {} dropping", self.name);
    }
}

fn spawn_worker(device: Weak<OtgDevice>, mut rx: mpsc::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let Some(device) = device.upgrade() else {
                break;
            };
            device.run_deferred_work().await;
            device.work_done.send_modify(|completed| *completed += 1);
        }
        debug!("OTG work queue closed");
    })
}
