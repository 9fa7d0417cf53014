// ── Activity wire types ──
//
// Activities are the house-level event feed: lock/unlock operations,
// DoorSense transitions, doorbell motion and rings. They are immutable
// records; consumers keep only the most recent one per device and type.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::model::device::{DoorState, LockDetail, LockStatus};

/// Event window applied to momentary doorbell activities, so a ring or
/// motion event stays "active" briefly after its start time.
const DOORBELL_EVENT_WINDOW: TimeDelta = TimeDelta::seconds(30);

/// Classified activity kind, derived from the wire `deviceType`/`action`
/// pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    LockOperation,
    DoorOperation,
    DoorbellMotion,
    DoorbellDing,
    Unknown,
}

impl ActivityType {
    fn classify(action: &str) -> Self {
        match action {
            "lock" | "unlock" | "onetouchlock" => Self::LockOperation,
            "dooropen" | "doorclosed" => Self::DoorOperation,
            "doorbell_motion_detected" | "imagecapture" => Self::DoorbellMotion,
            "doorbell_call_missed" | "doorbell_call_hangup" | "doorbell_call_initiated" => {
                Self::DoorbellDing
            }
            _ => Self::Unknown,
        }
    }
}

/// A single immutable event from the house activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub device_id: String,
    pub device_name: String,
    pub activity_type: ActivityType,
    /// Raw vendor action string (e.g. `"unlock"`, `"dooropen"`).
    pub action: String,
    pub activity_start_time: DateTime<Utc>,
    pub activity_end_time: DateTime<Utc>,
    /// Display name of the account that performed the operation.
    pub operated_by: Option<String>,
    pub operated_remote: Option<bool>,
    pub operated_keypad: Option<bool>,
    /// Snapshot image captured with the event, if any.
    pub image_url: Option<String>,
}

// The feed payload nests identity and operator info; flatten it into the
// public record at deserialization time.
#[derive(Deserialize)]
struct ActivityWire {
    #[serde(rename = "deviceID")]
    device_id: String,
    #[serde(rename = "deviceName", default)]
    device_name: String,
    action: String,
    /// Epoch milliseconds.
    #[serde(rename = "dateTime")]
    date_time: f64,
    #[serde(rename = "callingUser", default)]
    calling_user: Option<CallingUserWire>,
    #[serde(default)]
    info: Option<ActivityInfoWire>,
}

#[derive(Deserialize)]
struct CallingUserWire {
    #[serde(rename = "FirstName", default)]
    first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct ActivityInfoWire {
    #[serde(default)]
    remote: Option<bool>,
    #[serde(default)]
    keypad: Option<bool>,
    #[serde(default)]
    image: Option<String>,
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_millis(millis: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis as i64).unwrap_or(DateTime::UNIX_EPOCH)
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ActivityWire::deserialize(deserializer)?;
        let activity_type = ActivityType::classify(&wire.action);
        let start = from_epoch_millis(wire.date_time);
        let end = match activity_type {
            ActivityType::DoorbellMotion | ActivityType::DoorbellDing => {
                start + DOORBELL_EVENT_WINDOW
            }
            _ => start,
        };

        let operated_by = wire.calling_user.and_then(|u| {
            let name = [u.first_name, u.last_name]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!name.is_empty()).then_some(name)
        });

        let (operated_remote, operated_keypad, image_url) = wire
            .info
            .map_or((None, None, None), |i| (i.remote, i.keypad, i.image));

        Ok(Self {
            device_id: wire.device_id,
            device_name: wire.device_name,
            activity_type,
            action: wire.action,
            activity_start_time: start,
            activity_end_time: end,
            operated_by,
            operated_remote,
            operated_keypad,
            image_url,
        })
    }
}

/// Patch a cached [`LockDetail`] in place from a newer activity record,
/// so reads reflect a lock/unlock or door transition ahead of the next
/// full detail refresh. Older activities never regress the detail (the
/// setters compare against the recorded status timestamp).
pub fn apply_activity_to_lock_detail(detail: &mut LockDetail, activity: &Activity) {
    match activity.activity_type {
        ActivityType::LockOperation => {
            let status = match activity.action.as_str() {
                "lock" | "onetouchlock" => LockStatus::Locked,
                "unlock" => LockStatus::Unlocked,
                _ => LockStatus::Unknown,
            };
            detail.set_lock_status(status, activity.activity_start_time);
        }
        ActivityType::DoorOperation => {
            let door_state = match activity.action.as_str() {
                "dooropen" => DoorState::Open,
                "doorclosed" => DoorState::Closed,
                _ => DoorState::Unknown,
            };
            detail.set_door_state(door_state, activity.activity_start_time);
        }
        _ => {}
    }
}
