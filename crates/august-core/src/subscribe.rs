// Per-device update notifications.
//
// Consumers subscribe by device id and get woken whenever cached state
// for that device may have changed. The channel carries a version
// counter rather than the state itself; subscribers re-read the cache.

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

/// Fan-out bus for "device `X` changed" signals.
///
/// Notifications are deliberately coalescing: a subscriber that missed
/// three bumps sees one wake-up with the latest version, which is the
/// right behavior for cache re-readers.
#[derive(Debug, Default)]
pub struct DeviceUpdateBus {
    channels: DashMap<String, watch::Sender<u64>>,
}

impl DeviceUpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to update signals for one device.
    pub fn subscribe(&self, device_id: &str) -> watch::Receiver<u64> {
        self.channels
            .entry(device_id.to_owned())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    /// Signal that a device's cached state may have changed.
    ///
    /// Devices nobody subscribed to are skipped entirely.
    pub fn notify(&self, device_id: &str) {
        if let Some(sender) = self.channels.get(device_id) {
            sender.send_modify(|version| *version += 1);
            trace!(device_id, "notified device update");
        }
    }

    /// Signal a batch of devices, each at most once.
    pub fn notify_all<'a>(&self, device_ids: impl IntoIterator<Item = &'a str>) {
        for device_id in device_ids {
            self.notify(device_id);
        }
    }
}
