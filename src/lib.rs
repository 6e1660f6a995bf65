//! tegra-otg - USB OTG role detection and switching
//!
//! This crate watches the cable-ID and VBUS lines of a USB OTG port and moves
//! the port between host, peripheral and idle roles, starting and stopping the
//! host controller or notifying the gadget as it goes. A software board model
//! in [`sim`] drives the core in tests and in the `tegra-otg` binary.

pub mod config;
pub mod error;
pub mod events;
pub mod otg;
pub mod sim;

pub use error::{OtgError, Result};
