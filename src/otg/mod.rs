//! USB OTG role detection and switching
//!
//! Architecture:
//! ```text
//! handle_irq / set_peripheral (capture, never blocks)
//!     └── signal::read_signals + compute_active_interrupts
//!             └── deferred worker (single slot, coalescing)
//!                     └── transition::apply_transition
//!                             ├── role::resolve (pure)
//!                             └── HostController / Gadget side effects
//! suspend / resume (power.rs) save and restore the wakeup register
//! ```
//!
//! Boards hand the hardware to [`OtgDevice::probe`] through the traits in
//! [`platform`]; [`OtgRegistry`] replaces a global device pointer for
//! subsystems that need to request a VBUS recheck without a handle.

mod device;
pub mod platform;
mod power;
mod registry;
pub mod regs;
mod role;
mod signal;
mod transition;

pub use device::{OtgDevice, OtgStats, OtgStatus};
pub use platform::{
    Gadget, HostBus, HostController, HostHandle, IrqController, IrqHandler, IrqReturn, OtgClock,
    PlatformResources, WakeupRegister,
};
pub use registry::OtgRegistry;
pub use regs::InterruptMask;
pub use role::{resolve, OtgRole};
pub use signal::{compute_active_interrupts, read_signals, SignalState};
pub use transition::TransitionContext;
