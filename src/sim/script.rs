//! Scripted cable sessions for the simulator

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::SimBoard;
use crate::error::Result;
use crate::otg::OtgDevice;

/// One scripted action
///
/// Serialized as `{ "step": "attach_pc" }` or
/// `{ "step": "wait_ms", "ms": 20 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// OTG "A" plug: ID grounded, no VBUS from the far end
    AttachHostCable,
    /// Dedicated charger: ID floating, VBUS up
    AttachCharger,
    /// Upstream PC: ID floating, VBUS up
    AttachPc,
    /// Nothing plugged in
    Detach,
    Suspend,
    Resume,
    /// Clock-only deferred run
    Recheck,
    /// Force VBUS from software, `null` releases the override
    SetVbusOverride { value: Option<bool> },
    /// Force the cable-ID from software, `null` releases the override
    SetCableIdOverride { value: Option<bool> },
    WaitMs { ms: u64 },
}

/// Read a script from a JSON file
pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Session run by `--demo`
pub fn demo_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::AttachPc,
        ScriptStep::Detach,
        ScriptStep::AttachHostCable,
        ScriptStep::Suspend,
        ScriptStep::Resume,
        ScriptStep::Detach,
        ScriptStep::AttachCharger,
        ScriptStep::SetVbusOverride { value: Some(false) },
        ScriptStep::Recheck,
        ScriptStep::SetVbusOverride { value: None },
        ScriptStep::Detach,
    ]
}

/// Play `steps` against a probed device, waiting for deferred work after each
pub async fn run_script(device: &OtgDevice, board: &SimBoard, steps: &[ScriptStep]) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        info!("step {}: {:?}", index, step);
        match step {
            ScriptStep::AttachHostCable => {
                board.plug(false, false);
            }
            ScriptStep::AttachCharger | ScriptStep::AttachPc => {
                board.plug(true, true);
            }
            ScriptStep::Detach => {
                board.plug(true, false);
            }
            ScriptStep::Suspend => device.suspend().await?,
            ScriptStep::Resume => device.resume().await,
            ScriptStep::Recheck => device.request_vbus_recheck(),
            ScriptStep::SetVbusOverride { value } => device.overrides().set_vbus(*value),
            ScriptStep::SetCableIdOverride { value } => device.overrides().set_cable_id(*value),
            ScriptStep::WaitMs { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }
        device.flush_work().await;
        info!("step {}: role {}", index, device.role());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OtgPlatformConfig;
    use crate::otg::regs::USB_ID_STATUS;
    use crate::otg::OtgRole;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::assert_ok;

    #[test]
    fn test_step_wire_format() {
        let steps: Vec<ScriptStep> = serde_json::from_str(
            r#"[{"step":"attach_pc"},{"step":"wait_ms","ms":5},{"step":"set_vbus_override","value":null}]"#,
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![
                ScriptStep::AttachPc,
                ScriptStep::WaitMs { ms: 5 },
                ScriptStep::SetVbusOverride { value: None },
            ]
        );
    }

    #[test]
    fn test_load_script_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"step":"detach"}},{{"step":"suspend"}}]"#).unwrap();
        let steps = assert_ok!(load_script(file.path()));
        assert_eq!(steps, vec![ScriptStep::Detach, ScriptStep::Suspend]);
    }

    #[tokio::test]
    async fn test_demo_session() {
        let board = SimBoard::new(USB_ID_STATUS);
        let config = OtgPlatformConfig {
            name: "usb0".to_string(),
            irq: Some(board.irq),
            resume_settle_ms: 0,
            ..Default::default()
        };
        let device = OtgDevice::probe(Some(config), board.resources()).unwrap();
        device.set_peripheral(Some(board.gadget.clone())).unwrap();

        assert_ok!(run_script(&device, &board, &demo_script()).await);

        assert_eq!(device.role(), OtgRole::Suspended);
        assert_eq!(board.host.starts(), 1);
        assert_eq!(board.host.running(), 0);
        assert!(!board.gadget.is_connected());
        assert_eq!(board.gadget.connects(), board.gadget.disconnects());

        device.remove().await;
    }
}
