// Activity stream: house feed polling and the latest-activity table.
//
// The feed is the cheap, frequently polled source of truth between
// detail refreshes. Each poll merges the newest record per
// (device, activity type) into a table, patches cached details from
// records that won the merge, and wakes subscribers once per changed
// device.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use august_api::model::{Activity, ActivityType};

use crate::detail::DetailCache;
use crate::error::CoreError;
use crate::gateway::AugustGateway;
use crate::subscribe::DeviceUpdateBus;
use crate::throttle::Throttle;

/// Records fetched per house on a steady-state poll.
const ACTIVITY_FETCH_LIMIT: u32 = 10;

/// Records fetched per house on the first poll, to backfill state for
/// devices that have been quiet.
const INITIAL_FETCH_LIMIT: u32 = 20;

/// Latest-activity table and the polling machinery that feeds it.
///
/// Per device the table holds one slot per activity type, in the order
/// the types were first seen, so enumeration is stable across polls.
pub struct ActivityStream {
    house_ids: Vec<String>,
    latest: RwLock<HashMap<String, Vec<Activity>>>,
    throttle: Throttle,
    first_poll_done: AtomicBool,
}

/// Handle to a running poll loop; dropping it without [`stop`] leaves
/// the loop running until the runtime shuts down.
///
/// [`stop`]: ActivityStreamHandle::stop
pub struct ActivityStreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActivityStreamHandle {
    /// Cancel the poll loop and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "activity poll task did not shut down cleanly");
        }
    }
}

impl ActivityStream {
    pub fn new(house_ids: Vec<String>, activity_update_interval: Duration) -> Self {
        Self {
            house_ids,
            latest: RwLock::new(HashMap::new()),
            throttle: Throttle::new(activity_update_interval),
            first_poll_done: AtomicBool::new(false),
        }
    }

    /// Poll every house feed once, unconditionally.
    ///
    /// Token refresh is driven from here so it happens on the cadence of
    /// the most frequent network activity. A failed fetch for one house
    /// is logged and skipped; the other houses still update.
    pub async fn poll_once(
        &self,
        gateway: &AugustGateway,
        details: &DetailCache,
        bus: &DeviceUpdateBus,
    ) -> Result<(), CoreError> {
        gateway.refresh_access_token_if_needed().await?;
        let access_token = gateway.access_token().await?;

        let limit = if self.first_poll_done.load(Ordering::Relaxed) {
            ACTIVITY_FETCH_LIMIT
        } else {
            INITIAL_FETCH_LIMIT
        };

        let mut accepted = Vec::new();
        let mut any_fetched = false;
        for house_id in &self.house_ids {
            let activities = match gateway
                .api()
                .get_house_activities(&access_token, house_id, limit)
                .await
            {
                Ok(activities) => activities,
                Err(e) if e.is_request_error() => {
                    warn!(house_id, error = %e, "activity fetch failed, skipping house");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            any_fetched = true;
            accepted.extend(self.merge(activities).await);
        }

        // The larger backfill limit stays in effect until at least one
        // house feed actually came back.
        if any_fetched {
            self.first_poll_done.store(true, Ordering::Relaxed);
        }

        dispatch_updates(&accepted, details, bus).await;
        Ok(())
    }

    /// Poll subject to the activity throttle. Read paths call this
    /// eagerly; only one caller per interval actually hits the vendor.
    pub async fn refresh_throttled(
        &self,
        gateway: &AugustGateway,
        details: &DetailCache,
        bus: &DeviceUpdateBus,
    ) -> Result<(), CoreError> {
        if !self.throttle.should_run() {
            return Ok(());
        }
        self.poll_once(gateway, details, bus).await
    }

    /// Merge fetched records into the latest-activity table.
    ///
    /// A record replaces the stored one for its (device, type) slot only
    /// when its start time is strictly newer; re-delivered and stale
    /// records are discarded so they never trigger notifications.
    /// Returns the records that won their slot.
    pub async fn merge(&self, activities: Vec<Activity>) -> Vec<Activity> {
        let mut latest = self.latest.write().await;
        let mut accepted = Vec::new();

        for activity in activities {
            let slots = latest.entry(activity.device_id.clone()).or_default();
            match slots
                .iter_mut()
                .find(|stored| stored.activity_type == activity.activity_type)
            {
                Some(stored) if activity.activity_start_time > stored.activity_start_time => {
                    *stored = activity.clone();
                    accepted.push(activity);
                }
                Some(_) => {}
                None => {
                    slots.push(activity.clone());
                    accepted.push(activity);
                }
            }
        }

        accepted
    }

    /// The freshest stored activity for a device across the given types.
    pub async fn get_latest_device_activity(
        &self,
        device_id: &str,
        activity_types: &[ActivityType],
    ) -> Option<Activity> {
        let latest = self.latest.read().await;
        latest
            .get(device_id)?
            .iter()
            .filter(|a| activity_types.contains(&a.activity_type))
            .max_by_key(|a| a.activity_start_time)
            .cloned()
    }

    /// Stored latest activities for a device, filtered by type, in the
    /// order the types were first seen. An empty filter means all types.
    pub async fn get_device_activities(
        &self,
        device_id: &str,
        activity_types: &[ActivityType],
    ) -> Vec<Activity> {
        let latest = self.latest.read().await;
        let Some(slots) = latest.get(device_id) else {
            return Vec::new();
        };
        slots
            .iter()
            .filter(|a| activity_types.is_empty() || activity_types.contains(&a.activity_type))
            .cloned()
            .collect()
    }

    /// Spawn the background poll loop.
    pub fn start(
        self: &Arc<Self>,
        gateway: Arc<AugustGateway>,
        details: Arc<DetailCache>,
        bus: Arc<DeviceUpdateBus>,
        interval: Duration,
    ) -> ActivityStreamHandle {
        let stream = Arc::clone(self);
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            info!(houses = stream.house_ids.len(), "activity poll loop started");
            // tokio panics on a zero-period interval.
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = stream
                            .refresh_throttled(&gateway, &details, &bus)
                            .await
                        {
                            warn!(error = %e, "activity poll failed");
                        }
                    }
                }
            }
            info!("activity poll loop stopped");
        });

        ActivityStreamHandle { cancel, task }
    }
}

/// Patch cached details from accepted records and wake subscribers,
/// once per device no matter how many records it had.
async fn dispatch_updates(accepted: &[Activity], details: &DetailCache, bus: &DeviceUpdateBus) {
    let mut notified: HashSet<&str> = HashSet::new();
    for activity in accepted {
        details.apply_activity(activity).await;
        notified.insert(activity.device_id.as_str());
    }
    if !notified.is_empty() {
        debug!(devices = notified.len(), "dispatching activity updates");
        bus.notify_all(notified);
    }
}
