use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{OtgPlatformConfig, OverrideConfig, SignalOverride};
use crate::error::{OtgError, Result};

/// Load a platform configuration from a JSON file
pub fn load_config(path: &Path) -> Result<OtgPlatformConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: OtgPlatformConfig =
        serde_json::from_str(&json).map_err(|e| OtgError::Config(e.to_string()))?;
    config.validate()?;
    debug!("Loaded OTG platform config from {}", path.display());
    Ok(config)
}

/// Save a platform configuration as pretty JSON
pub fn save_config(path: &Path, config: &OtgPlatformConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Live software-override values shared between the platform layer and the OTG core
///
/// The core only ever reads, from the interrupt path too, so reads are
/// lock-free. The platform may change a value and then ask the device for a
/// VBUS recheck.
#[derive(Debug, Clone)]
pub struct SignalOverrides {
    inner: Arc<ArcSwap<OverrideConfig>>,
}

impl Default for SignalOverrides {
    fn default() -> Self {
        Self::new(OverrideConfig::default())
    }
}

impl SignalOverrides {
    pub fn new(config: OverrideConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Current override values (cheap copy)
    pub fn get(&self) -> OverrideConfig {
        **self.inner.load()
    }

    /// Force (or release, with `None`) the cable-ID signal
    pub fn set_cable_id(&self, value: Option<bool>) {
        self.inner.rcu(|current| {
            let mut config = **current;
            config.cable_id = SignalOverride::from_option(value);
            config
        });
    }

    /// Force (or release, with `None`) the VBUS signal
    pub fn set_vbus(&self, value: Option<bool>) {
        self.inner.rcu(|current| {
            let mut config = **current;
            config.vbus = SignalOverride::from_option(value);
            config
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("otg.json");

        let mut config = OtgPlatformConfig::default();
        config.name = "usb0".to_string();
        config.irq = Some(52);
        config.overrides.vbus = SignalOverride::forced(true);
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("otg.json");
        std::fs::write(&path, r#"{ "irq": 20 }"#).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.irq, Some(20));
        assert_eq!(loaded.name, "tegra-otg");
        assert_eq!(loaded.resume_settle_ms, 1);
        assert_eq!(loaded.overrides, OverrideConfig::default());
    }

    #[test]
    fn test_empty_name_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("otg.json");
        std::fs::write(&path, r#"{ "name": "  " }"#).unwrap();

        assert!(matches!(load_config(&path), Err(OtgError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("nope.json")),
            Err(OtgError::Io(_))
        ));
    }

    #[test]
    fn test_live_overrides() {
        let overrides = SignalOverrides::default();
        let shared = overrides.clone();
        assert_eq!(overrides.get().vbus(), None);

        shared.set_vbus(Some(false));
        assert_eq!(overrides.get().vbus(), Some(false));
        assert_eq!(overrides.get().cable_id(), None);

        shared.set_vbus(None);
        assert_eq!(overrides.get().vbus(), None);
    }
}
