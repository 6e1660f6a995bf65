//! Event system for OTG state notifications
//!
//! Stands in for the transceiver notifier chain: interested subsystems
//! subscribe and receive role changes as they happen.

pub mod types;

pub use types::OtgEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event bus for broadcasting OTG events
///
/// # Example
///
/// ```no_run
/// use tegra_otg::events::{EventBus, OtgEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = rx.recv().await {
///         println!("Received event: {:?}", event);
///     }
/// });
/// ```
pub struct EventBus {
    tx: broadcast::Sender<OtgEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// Events without subscribers are dropped.
    pub fn publish(&self, event: OtgEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// A subscriber that falls too far behind receives `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<OtgEvent> {
        self.tx.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otg::OtgRole;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(OtgEvent::RoleChanged {
            device: "usb0".to_string(),
            from: OtgRole::Suspended,
            to: OtgRole::Peripheral,
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            OtgEvent::RoleChanged {
                to: OtgRole::Peripheral,
                ..
            }
        ));
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        // Should not panic when publishing with no subscribers
        bus.publish(OtgEvent::Suspended {
            device: "usb0".to_string(),
        });
    }
}
