//! Suspend/resume hooks
//!
//! Suspend saves the wakeup register and gates the clock; resume restores the
//! register. Neither re-evaluates the role, the next interrupt or recheck does.

use tracing::{debug, info};

use super::device::OtgDevice;
use super::role::OtgRole;
use crate::error::Result;
use crate::events::OtgEvent;

impl OtgDevice {
    /// Save interrupt configuration, disconnect an active gadget, gate the clock
    ///
    /// Queued deferred work finishes first and a transition in progress is
    /// waited for, so the role seen here has all its side effects applied.
    pub async fn suspend(&self) -> Result<()> {
        self.flush_work().await;
        let _transition = self.transition_lock.lock().await;

        let (from, gadget_attached) = {
            let mut st = self.state.lock();
            st.saved_wakeup = self.with_regs(|regs| regs.read());
            (st.role, st.gadget.is_some())
        };
        debug!("{}: saved wakeup register before suspend", self.name);

        if from == OtgRole::Peripheral && gadget_attached {
            self.gadget_vbus(false).await;
            self.state.lock().role = OtgRole::Suspended;
            info!("{}: OTG role {} -> {} on suspend", self.name, from, OtgRole::Suspended);
            self.publish(OtgEvent::RoleChanged {
                device: self.name.clone(),
                from,
                to: OtgRole::Suspended,
            });
        }

        self.disable_clk();
        self.publish(OtgEvent::Suspended {
            device: self.name.clone(),
        });
        Ok(())
    }

    /// Re-enable the clock and restore the saved interrupt configuration
    pub async fn resume(&self) {
        self.enable_clk();
        // Settle delay after ungating; the block hangs without it
        tokio::time::sleep(self.resume_settle).await;

        {
            let st = self.state.lock();
            self.with_regs(|regs| regs.write(st.saved_wakeup));
        }
        debug!("{}: restored wakeup register after resume", self.name);
        self.publish(OtgEvent::Resumed {
            device: self.name.clone(),
        });
    }
}
