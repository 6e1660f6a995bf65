//! OTG event types
//!
//! Defines the notifications broadcast through the event bus.

use serde::{Deserialize, Serialize};

use crate::otg::OtgRole;

/// OTG event enumeration
///
/// Serialized as `{ "event": "otg.role_changed", "data": { ... } }`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum OtgEvent {
    /// The port moved to a new role
    #[serde(rename = "otg.role_changed")]
    RoleChanged {
        device: String,
        from: OtgRole,
        to: OtgRole,
    },

    /// Host role was recorded but the host controller did not come up
    #[serde(rename = "otg.host_start_failed")]
    HostStartFailed { device: String, reason: String },

    /// Wakeup register saved and clock gated
    #[serde(rename = "otg.suspended")]
    Suspended { device: String },

    /// Wakeup register restored
    #[serde(rename = "otg.resumed")]
    Resumed { device: String },
}

impl OtgEvent {
    /// Name of the device the event concerns
    pub fn device(&self) -> &str {
        match self {
            Self::RoleChanged { device, .. }
            | Self::HostStartFailed { device, .. }
            | Self::Suspended { device }
            | Self::Resumed { device } => device,
        }
    }
}
