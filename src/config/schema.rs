use serde::{Deserialize, Serialize};

use crate::error::{OtgError, Result};

/// Platform configuration for one OTG port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OtgPlatformConfig {
    /// Device identity (used for logging and the registry)
    pub name: String,
    /// Interrupt line of the wakeup block
    pub irq: Option<u32>,
    /// Software overrides for the cable-ID and VBUS signals
    pub overrides: OverrideConfig,
    /// Initial raw wakeup register contents (simulator only)
    pub initial_wakeup: u32,
    /// Settle delay after re-enabling the clock on resume
    pub resume_settle_ms: u64,
}

impl Default for OtgPlatformConfig {
    fn default() -> Self {
        Self {
            name: "tegra-otg".to_string(),
            irq: None,
            overrides: OverrideConfig::default(),
            // ID line idle high, nothing attached
            initial_wakeup: crate::otg::regs::USB_ID_STATUS,
            resume_settle_ms: 1,
        }
    }
}

impl OtgPlatformConfig {
    /// Reject configurations probe can never succeed with
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OtgError::Config("OTG device name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Forced value for a single monitored signal
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignalOverride {
    /// Whether the forced value replaces the physical register bit
    pub enabled: bool,
    /// The forced value (true = signal present)
    pub value: bool,
}

impl SignalOverride {
    /// An override forcing `value`
    pub fn forced(value: bool) -> Self {
        Self {
            enabled: true,
            value,
        }
    }

    /// `None` releases the override
    pub fn from_option(value: Option<bool>) -> Self {
        value.map(Self::forced).unwrap_or_default()
    }

    /// The forced value, if the override is active
    pub fn get(&self) -> Option<bool> {
        self.enabled.then_some(self.value)
    }
}

/// Override pair for the two signals the OTG core monitors
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OverrideConfig {
    pub cable_id: SignalOverride,
    pub vbus: SignalOverride,
}

impl OverrideConfig {
    pub fn cable_id(&self) -> Option<bool> {
        self.cable_id.get()
    }

    pub fn vbus(&self) -> Option<bool> {
        self.vbus.get()
    }
}
