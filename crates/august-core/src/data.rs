// Data facade: the one object an integration holds.
//
// Owns the gateway, the detail cache, the activity stream, and the
// tracked device set. Read paths refresh eagerly but are throttled
// underneath; failed refreshes degrade to cached data instead of
// erroring a read.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use august_api::model::{Activity, ActivityType, Doorbell, Lock};

use crate::activity::{ActivityStream, ActivityStreamHandle};
use crate::config::AugustConfig;
use crate::detail::DetailCache;
use crate::device::{Device, DeviceDetail};
use crate::error::CoreError;
use crate::gateway::AugustGateway;
use crate::subscribe::DeviceUpdateBus;

/// The two remote operations a lock supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockOperation {
    Lock,
    Unlock,
}

impl LockOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

/// Live view of an August account: tracked devices, cached state, and
/// the polling machinery keeping both current.
pub struct AugustData {
    gateway: Arc<AugustGateway>,
    details: Arc<DetailCache>,
    activities: Arc<ActivityStream>,
    bus: Arc<DeviceUpdateBus>,
    devices: HashMap<String, Device>,
    stream_handle: Mutex<Option<ActivityStreamHandle>>,
}

impl AugustData {
    /// Authenticate, discover devices, prime the caches, and start the
    /// background activity poll.
    pub async fn setup(config: AugustConfig) -> Result<Self, CoreError> {
        let gateway = Arc::new(AugustGateway::new(&config)?);
        gateway.authenticate().await?;

        let access_token = gateway.access_token().await?;
        let locks = gateway.api().get_operable_locks(&access_token).await?;
        let doorbells = gateway.api().get_doorbells(&access_token).await?;
        info!(
            locks = locks.len(),
            doorbells = doorbells.len(),
            "discovered devices"
        );

        let mut devices: HashMap<String, Device> = HashMap::new();
        for lock in locks {
            devices.insert(lock.device_id.clone(), Device::Lock(lock));
        }
        for doorbell in doorbells {
            devices.insert(doorbell.device_id.clone(), Device::Doorbell(doorbell));
        }

        // Prime every snapshot synchronously so the first reads after
        // setup never see an empty cache.
        let details = Arc::new(DetailCache::new(config.detail_update_interval));
        let device_list: Vec<Device> = devices.values().cloned().collect();
        details.refresh(&gateway, &device_list).await?;

        filter_operative_locks(&mut devices, &details).await;

        let mut house_ids: Vec<String> = devices
            .values()
            .map(|d| d.house_id().to_owned())
            .collect();
        house_ids.sort_unstable();
        house_ids.dedup();

        let activities = Arc::new(ActivityStream::new(
            house_ids,
            config.activity_update_interval,
        ));
        let bus = Arc::new(DeviceUpdateBus::new());
        // First poll backfills recent history before the loop takes
        // over; going through the throttle stamps it so the loop's
        // immediate first tick does not poll again.
        activities.refresh_throttled(&gateway, &details, &bus).await?;

        let handle = activities.start(
            Arc::clone(&gateway),
            Arc::clone(&details),
            Arc::clone(&bus),
            config.activity_update_interval,
        );

        Ok(Self {
            gateway,
            details,
            activities,
            bus,
            devices,
            stream_handle: Mutex::new(Some(handle)),
        })
    }

    // ── Device set ───────────────────────────────────────────────────

    pub fn get_device(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }

    /// The distinct house ids covering every tracked device.
    pub fn house_ids(&self) -> Vec<String> {
        let mut house_ids: Vec<String> = self
            .devices
            .values()
            .map(|d| d.house_id().to_owned())
            .collect();
        house_ids.sort_unstable();
        house_ids.dedup();
        house_ids
    }

    pub fn get_devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn get_locks(&self) -> Vec<&Lock> {
        self.devices
            .values()
            .filter_map(|d| match d {
                Device::Lock(lock) => Some(lock),
                Device::Doorbell(_) => None,
            })
            .collect()
    }

    pub fn get_doorbells(&self) -> Vec<&Doorbell> {
        self.devices
            .values()
            .filter_map(|d| match d {
                Device::Lock(_) => None,
                Device::Doorbell(doorbell) => Some(doorbell),
            })
            .collect()
    }

    // ── Cached state reads ───────────────────────────────────────────

    /// The current snapshot for a device.
    ///
    /// Triggers throttled activity and detail refreshes first; if either
    /// fails the error is logged and the cached snapshot is served, on
    /// the theory that stale data beats no data. `Ok(None)` means the
    /// device's last detail fetch failed and it should be shown as
    /// unavailable.
    pub async fn get_device_detail(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceDetail>, CoreError> {
        if !self.devices.contains_key(device_id) {
            return Err(CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            });
        }

        self.refresh_activities_best_effort().await;

        let device_list: Vec<Device> = self.devices.values().cloned().collect();
        match self.details.refresh(&self.gateway, &device_list).await {
            Ok(Some(refreshed)) => self.bus.notify_all(refreshed.iter().map(String::as_str)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "detail refresh failed, serving cached data"),
        }

        Ok(self.details.get_detail(device_id).await)
    }

    /// The freshest stored activity for a device across the given types.
    ///
    /// Triggers a throttled activity refresh first, like
    /// [`get_device_detail`](Self::get_device_detail), so reads stay
    /// fresh even when the background loop is stopped.
    pub async fn get_latest_device_activity(
        &self,
        device_id: &str,
        activity_types: &[ActivityType],
    ) -> Option<Activity> {
        self.refresh_activities_best_effort().await;
        self.activities
            .get_latest_device_activity(device_id, activity_types)
            .await
    }

    /// Stored latest activities for a device, filtered by type (empty
    /// filter means all types), in the order the types were first seen.
    /// Triggers a throttled activity refresh first.
    pub async fn get_device_activities(
        &self,
        device_id: &str,
        activity_types: &[ActivityType],
    ) -> Vec<Activity> {
        self.refresh_activities_best_effort().await;
        self.activities
            .get_device_activities(device_id, activity_types)
            .await
    }

    /// Throttled activity refresh for the read paths: a failure is
    /// logged and the stored table is served as-is.
    async fn refresh_activities_best_effort(&self) {
        if let Err(e) = self
            .activities
            .refresh_throttled(&self.gateway, &self.details, &self.bus)
            .await
        {
            warn!(error = %e, "activity refresh failed, serving cached data");
        }
    }

    /// Subscribe to change signals for one device.
    pub fn subscribe(&self, device_id: &str) -> watch::Receiver<u64> {
        self.bus.subscribe(device_id)
    }

    // ── Remote operations ────────────────────────────────────────────

    /// Lock a lock, patching the cached snapshot immediately from the
    /// operation result instead of waiting for the next poll.
    pub async fn lock(&self, device_id: &str) -> Result<(), CoreError> {
        self.operate(device_id, LockOperation::Lock).await
    }

    /// Unlock a lock; see [`lock`](Self::lock).
    pub async fn unlock(&self, device_id: &str) -> Result<(), CoreError> {
        self.operate(device_id, LockOperation::Unlock).await
    }

    async fn operate(&self, device_id: &str, operation: LockOperation) -> Result<(), CoreError> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })?;
        let device_name = device.device_name().to_owned();
        if !device.is_lock() {
            return Err(CoreError::NotALock {
                device_id: device_id.to_owned(),
            });
        }

        let access_token = self.gateway.access_token().await?;
        let result = match operation {
            LockOperation::Lock => self.gateway.api().lock(&access_token, device_id).await,
            LockOperation::Unlock => self.gateway.api().unlock(&access_token, device_id).await,
        };
        let mut implied = result.map_err(|e| {
            CoreError::from(e).with_device_context(&device_name, operation.as_str())
        })?;

        // The operate response does not carry the display name.
        for activity in &mut implied {
            activity.device_name.clone_from(&device_name);
        }

        let accepted = self.activities.merge(implied).await;
        for activity in &accepted {
            self.details.apply_activity(activity).await;
        }
        if !accepted.is_empty() {
            self.bus.notify(device_id);
        }
        Ok(())
    }

    // ── 2FA flow ─────────────────────────────────────────────────────

    /// Ask the vendor to send a 2FA verification code.
    pub async fn send_verification_code(&self) -> Result<(), CoreError> {
        self.gateway.send_verification_code().await
    }

    /// Submit a 2FA verification code; `Ok(false)` means the code was
    /// rejected and the user should retry.
    pub async fn validate_verification_code(&self, code: &str) -> Result<bool, CoreError> {
        self.gateway.validate_verification_code(code).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop the background activity poll. Idempotent.
    pub async fn stop(&self) {
        if let Some(handle) = self.stream_handle.lock().await.take() {
            handle.stop().await;
        }
    }
}

/// Drop locks that cannot be operated remotely, each with its reason.
///
/// A lock with no snapshot may just be temporarily unreachable, but
/// without a detail there is no way to know it has a bridge at all, so
/// it is excluded the same as a bridgeless one.
async fn filter_operative_locks(devices: &mut HashMap<String, Device>, details: &DetailCache) {
    let lock_ids: Vec<String> = devices
        .iter()
        .filter(|(_, d)| d.is_lock())
        .map(|(id, _)| id.clone())
        .collect();

    for device_id in lock_ids {
        let Some(device) = devices.get(&device_id) else {
            continue;
        };
        let device_name = device.device_name().to_owned();

        let Some(detail) = details.get_detail(&device_id).await else {
            warn!(
                device_id,
                device_name, "excluding lock: detail unavailable at setup"
            );
            devices.remove(&device_id);
            continue;
        };
        let Some(lock_detail) = detail.as_lock() else {
            continue;
        };

        if lock_detail.bridge.is_none() {
            info!(device_id, device_name, "excluding lock: no bridge paired");
            devices.remove(&device_id);
        } else if !lock_detail.bridge_is_operative() {
            info!(
                device_id,
                device_name, "excluding lock: bridge reports inoperative"
            );
            devices.remove(&device_id);
        }
    }
}
