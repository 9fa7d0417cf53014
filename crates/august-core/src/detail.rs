// Detail cache: throttled snapshots of per-device state.
//
// Detail endpoints are expensive and rate-limited by the vendor, so the
// cache refreshes them at most once per configured interval and serves
// stored snapshots in between. Freshness between refreshes comes from
// activity records patched in by the activity stream.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use august_api::model::{Activity, ActivityType, apply_activity_to_lock_detail};

use crate::device::{Device, DeviceDetail};
use crate::error::CoreError;
use crate::gateway::AugustGateway;
use crate::throttle::Throttle;

/// Cached per-device state snapshots.
///
/// A device maps to `None` when its last detail fetch failed; consumers
/// treat that as "unavailable" until a later refresh succeeds.
pub struct DetailCache {
    details: RwLock<HashMap<String, Option<DeviceDetail>>>,
    throttle: Throttle,
}

impl DetailCache {
    pub fn new(detail_update_interval: Duration) -> Self {
        Self {
            details: RwLock::new(HashMap::new()),
            throttle: Throttle::new(detail_update_interval),
        }
    }

    /// Refresh every tracked device's snapshot, subject to the throttle.
    ///
    /// Returns the ids that were re-fetched, or `None` when the call was
    /// throttled and cached data stands. A failure of one device's fetch
    /// does not abort the others: the device is marked unavailable and
    /// the refresh continues. Non-request failures (for example a payload
    /// that no longer decodes) propagate, since retrying will not help.
    pub async fn refresh(
        &self,
        gateway: &AugustGateway,
        devices: &[Device],
    ) -> Result<Option<Vec<String>>, CoreError> {
        if !self.throttle.should_run() {
            debug!("detail refresh throttled, serving cached snapshots");
            return Ok(None);
        }

        let access_token = gateway.access_token().await?;
        let mut fetched = HashMap::with_capacity(devices.len());

        for device in devices {
            let detail = match fetch_detail(gateway, &access_token, device).await {
                Ok(detail) => Some(detail),
                Err(e) if e.is_request_error() => {
                    warn!(
                        device_id = device.device_id(),
                        device_name = device.device_name(),
                        error = %e,
                        "detail fetch failed, marking device unavailable"
                    );
                    None
                }
                Err(e) => return Err(e.into()),
            };
            fetched.insert(device.device_id().to_owned(), detail);
        }

        let refreshed: Vec<String> = fetched.keys().cloned().collect();
        debug!(count = refreshed.len(), "refreshed device details");
        self.details.write().await.extend(fetched);
        Ok(Some(refreshed))
    }

    /// The cached snapshot for a device. `None` when the device is
    /// unknown or its last fetch failed.
    pub async fn get_detail(&self, device_id: &str) -> Option<DeviceDetail> {
        self.details.read().await.get(device_id)?.clone()
    }

    /// Patch a cached snapshot from an activity record, without touching
    /// the network or the throttle.
    ///
    /// Returns `true` when the snapshot may have changed and subscribers
    /// should be notified.
    pub async fn apply_activity(&self, activity: &Activity) -> bool {
        let mut details = self.details.write().await;
        let Some(Some(detail)) = details.get_mut(&activity.device_id) else {
            return false;
        };

        match detail {
            DeviceDetail::Lock(lock_detail) => {
                let before = lock_detail.status.clone();
                apply_activity_to_lock_detail(lock_detail, activity);
                lock_detail.status != before
            }
            DeviceDetail::Doorbell(doorbell_detail) => {
                // Motion and ding events can carry a fresher capture than
                // the last detail fetch.
                if matches!(
                    activity.activity_type,
                    ActivityType::DoorbellMotion | ActivityType::DoorbellDing
                ) {
                    if let Some(image_url) = &activity.image_url {
                        let changed = doorbell_detail
                            .recent_image
                            .as_ref()
                            .is_none_or(|image| image.secure_url != *image_url);
                        if changed {
                            doorbell_detail.recent_image =
                                Some(august_api::model::RecentImage {
                                    secure_url: image_url.clone(),
                                });
                        }
                        return changed;
                    }
                    // No image, but the event itself is news.
                    return true;
                }
                false
            }
        }
    }
}

async fn fetch_detail(
    gateway: &AugustGateway,
    access_token: &str,
    device: &Device,
) -> Result<DeviceDetail, august_api::Error> {
    match device {
        Device::Lock(lock) => gateway
            .api()
            .get_lock_detail(access_token, &lock.device_id)
            .await
            .map(DeviceDetail::Lock),
        Device::Doorbell(doorbell) => gateway
            .api()
            .get_doorbell_detail(access_token, &doorbell.device_id)
            .await
            .map(DeviceDetail::Doorbell),
    }
}
