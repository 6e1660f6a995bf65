//! Transition engine
//!
//! Runs on the deferred worker, one invocation at a time. Applies the role
//! the resolver picks and performs the matching host/gadget side effects.
//! Role bookkeeping never rolls back when a side effect fails.

use tracing::{debug, info, warn};

use super::device::{OtgDevice, OtgState};
use super::regs::{
    InterruptMask, USB_ID_SW_EN, USB_ID_SW_VALUE, USB_INTS, USB_VBUS_SW_EN, USB_VBUS_SW_VALUE,
};
use super::role::{resolve, OtgRole};
use super::signal::read_signals;
use crate::events::OtgEvent;

/// Input of one deferred run, snapshotted under the device lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    /// Status captured by the interrupt front end
    pub int_status: u32,
    /// Only re-enable the clock, no role evaluation
    pub detect_vbus: bool,
    pub previous: OtgRole,
}

impl TransitionContext {
    fn capture(st: &OtgState) -> Self {
        Self {
            int_status: st.int_status,
            detect_vbus: st.detect_vbus,
            previous: st.role,
        }
    }
}

impl OtgDevice {
    /// Snapshot the pending work without consuming it
    pub fn transition_context(&self) -> TransitionContext {
        TransitionContext::capture(&self.state.lock())
    }

    /// Body of the deferred worker: consume the pending request and apply it
    ///
    /// Runs under the transition lock, so suspend never observes a role whose
    /// side effects are still in flight.
    pub(super) async fn run_deferred_work(&self) {
        let _transition = self.transition_lock.lock().await;
        let ctx = {
            let mut st = self.state.lock();
            let ctx = TransitionContext::capture(&st);
            st.detect_vbus = false;
            st.transition_pending = false;
            st.stats.work_runs += 1;
            ctx
        };
        self.apply_transition(ctx).await;
    }

    /// Resolve and apply a role change
    ///
    /// Returns the role entered, or `None` when nothing changed. A clock
    /// recheck request only turns the sticky clock on and leaves it on.
    pub async fn apply_transition(&self, ctx: TransitionContext) -> Option<OtgRole> {
        if ctx.detect_vbus {
            debug!("{}: VBUS recheck, enabling clock", self.name);
            self.enable_clk();
            return None;
        }

        let clocked = self.clock_get();
        let entered = self.transition(ctx).await;
        if clocked {
            self.clock.disable();
        }
        entered
    }

    async fn transition(&self, ctx: TransitionContext) -> Option<OtgRole> {
        let overrides = self.overrides.get();
        let signals = read_signals(ctx.int_status, &overrides);
        let pending = InterruptMask::from_register(ctx.int_status);
        let from = ctx.previous;

        let Some(to) = resolve(from, signals, pending) else {
            debug!("{}: OTG role stays {}", self.name, from);
            return None;
        };

        {
            let mut st = self.state.lock();
            st.role = to;
            st.stats.transitions += 1;
        }
        info!("{}: OTG role {} -> {}", self.name, from, to);
        self.publish(OtgEvent::RoleChanged {
            device: self.name.clone(),
            from,
            to,
        });

        match (from, to) {
            (OtgRole::Host, OtgRole::Suspended) => {
                if overrides.cable_id().is_some() {
                    self.force_cable_id(true);
                }
                self.stop_host().await;
            }
            (OtgRole::Peripheral, OtgRole::Suspended) => {
                if overrides.vbus().is_some() {
                    self.force_vbus(false);
                }
                self.gadget_vbus(false).await;
            }
            (OtgRole::Suspended, OtgRole::Peripheral) => {
                if overrides.vbus().is_some() {
                    self.force_vbus(true);
                }
                self.gadget_vbus(true).await;
            }
            (OtgRole::Suspended, OtgRole::Host) => {
                if overrides.cable_id().is_some() {
                    self.force_cable_id(false);
                }
                self.start_host().await;
            }
            _ => debug!("{}: no side effects for {} -> {}", self.name, from, to),
        }

        Some(to)
    }

    /// Drive the ID line from software
    fn force_cable_id(&self, present: bool) {
        let _st = self.state.lock();
        self.with_regs(|regs| {
            let mut val = (regs.read() & !USB_INTS) | USB_ID_SW_EN;
            if present {
                val |= USB_ID_SW_VALUE;
            } else {
                val &= !USB_ID_SW_VALUE;
            }
            regs.write(val);
        });
    }

    /// Drive the VBUS line from software
    fn force_vbus(&self, present: bool) {
        let _st = self.state.lock();
        self.with_regs(|regs| {
            let mut val = (regs.read() & !USB_INTS) | USB_VBUS_SW_EN;
            if present {
                val |= USB_VBUS_SW_VALUE;
            } else {
                val &= !USB_VBUS_SW_VALUE;
            }
            regs.write(val);
        });
    }

    async fn start_host(&self) {
        // Never two host controllers for one port
        let stale = self.state.lock().host_handle.take();
        if let Some(handle) = stale {
            warn!("{}: tearing down stale host controller", self.name);
            if let Err(e) = self.host.stop(handle).await {
                warn!("{}: failed to stop host controller: {}", self.name, e);
            }
        }

        match self.host.start().await {
            Ok(handle) => {
                self.state.lock().host_handle = Some(handle);
                debug!("{}: host controller {:?} started", self.name, handle);
            }
            Err(e) => {
                warn!("{}: failed to start host controller: {}", self.name, e);
                self.publish(OtgEvent::HostStartFailed {
                    device: self.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn stop_host(&self) {
        let handle = self.state.lock().host_handle.take();
        let Some(handle) = handle else {
            debug!("{}: no host controller running", self.name);
            return;
        };
        if let Err(e) = self.host.stop(handle).await {
            warn!("{}: failed to stop host controller: {}", self.name, e);
        }
    }

    /// Connect or disconnect the registered gadget, if any
    pub(super) async fn gadget_vbus(&self, connect: bool) {
        let gadget = self.state.lock().gadget.clone();
        let Some(gadget) = gadget else {
            debug!("{}: no gadget registered", self.name);
            return;
        };

        let result = if connect {
            gadget.vbus_connect().await
        } else {
            gadget.vbus_disconnect().await
        };
        if let Err(e) = result {
            warn!(
                "{}: gadget {} vbus {} failed: {}",
                self.name,
                gadget.name(),
                if connect { "connect" } else { "disconnect" },
                e
            );
        }
    }
}
