//! Platform configuration
//!
//! Board integration supplies an [`OtgPlatformConfig`] at probe time. Signal
//! overrides start from the file values and live on in [`SignalOverrides`].

mod schema;
mod store;

pub use schema::{OtgPlatformConfig, OverrideConfig, SignalOverride};
pub use store::{load_config, save_config, SignalOverrides};
