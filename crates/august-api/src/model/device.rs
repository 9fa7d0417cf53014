// ── Device wire types ──
//
// Deserialized straight from the August API payloads. The discovery
// endpoints return maps keyed by device id; `ApiClient` folds the key
// into the typed struct so consumers always see a flat device record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lock as returned by the discovery endpoint (`/users/locks/mine`).
///
/// Immutable after discovery; mutable state lives in [`LockDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub device_id: String,
    pub device_name: String,
    pub house_id: String,
    /// Access level of the authenticated account on this lock.
    /// Only `"superuser"` locks are remotely operable.
    pub user_type: String,
}

impl Lock {
    pub fn is_operable(&self) -> bool {
        self.user_type == "superuser"
    }
}

/// A doorbell as returned by the discovery endpoint (`/users/doorbells/mine`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doorbell {
    pub device_id: String,
    pub device_name: String,
    pub house_id: String,
    pub serial_number: Option<String>,
}

// ── Lock detail ─────────────────────────────────────────────────────

/// Remote lock position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    Unlocked,
    #[serde(other)]
    Unknown,
}

/// DoorSense door position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

/// The `LockStatus` object nested inside a lock detail payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatusInfo {
    #[serde(default = "LockStatusInfo::unknown_status")]
    pub status: LockStatus,
    #[serde(rename = "doorState", default = "LockStatusInfo::unknown_door")]
    pub door_state: DoorState,
    /// When the vendor last observed this status. Activity-driven patches
    /// must not regress this timestamp.
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<DateTime<Utc>>,
}

impl LockStatusInfo {
    fn unknown_status() -> LockStatus {
        LockStatus::Unknown
    }

    fn unknown_door() -> DoorState {
        DoorState::Unknown
    }
}

impl Default for LockStatusInfo {
    fn default() -> Self {
        Self {
            status: LockStatus::Unknown,
            door_state: DoorState::Unknown,
            date_time: None,
        }
    }
}

/// The bridge hardware that makes a lock remotely operable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub operative: bool,
    #[serde(rename = "deviceModel", default)]
    pub device_model: Option<String>,
    #[serde(rename = "firmwareVersion", default)]
    pub firmware_version: Option<String>,
    #[serde(rename = "hyperBridge", default)]
    pub hyper_bridge: bool,
}

/// Keypad accessory paired with a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "serialNumber", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "batteryLevel", default)]
    pub battery_level: Option<String>,
    #[serde(rename = "currentFirmwareVersion", default)]
    pub firmware_version: Option<String>,
}

/// Full per-lock state snapshot (`/locks/{id}`).
///
/// Mutable: refreshed wholesale by the detail cache and patched in place
/// from newer activity records via
/// [`apply_activity_to_lock_detail`](crate::model::apply_activity_to_lock_detail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockDetail {
    #[serde(rename = "LockID")]
    pub device_id: String,
    #[serde(rename = "LockName")]
    pub device_name: String,
    #[serde(rename = "HouseID")]
    pub house_id: String,
    #[serde(rename = "SerialNumber", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "currentFirmwareVersion", default)]
    pub firmware_version: Option<String>,
    #[serde(rename = "skuNumber", default)]
    pub model: Option<String>,
    /// Battery charge as a 0.0–1.0 fraction.
    #[serde(default)]
    pub battery: f64,
    #[serde(rename = "Bridge", default)]
    pub bridge: Option<Bridge>,
    #[serde(default)]
    pub keypad: Option<Keypad>,
    #[serde(rename = "LockStatus", default)]
    pub status: LockStatusInfo,
}

impl LockDetail {
    pub fn lock_status(&self) -> LockStatus {
        self.status.status
    }

    pub fn door_state(&self) -> DoorState {
        self.status.door_state
    }

    /// Battery charge as a whole percentage.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn battery_percent(&self) -> u8 {
        (self.battery.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// Whether the lock can be operated remotely: a bridge must be
    /// paired and reporting itself operative.
    pub fn bridge_is_operative(&self) -> bool {
        self.bridge.as_ref().is_some_and(|b| b.operative)
    }

    /// Overwrite the lock position if `observed_at` is not older than the
    /// currently recorded status timestamp.
    pub fn set_lock_status(&mut self, status: LockStatus, observed_at: DateTime<Utc>) {
        if self.status.date_time.is_none_or(|t| observed_at >= t) {
            self.status.status = status;
            self.status.date_time = Some(observed_at);
        }
    }

    /// Overwrite the DoorSense position if `observed_at` is not older
    /// than the currently recorded status timestamp.
    pub fn set_door_state(&mut self, door_state: DoorState, observed_at: DateTime<Utc>) {
        if self.status.date_time.is_none_or(|t| observed_at >= t) {
            self.status.door_state = door_state;
            self.status.date_time = Some(observed_at);
        }
    }
}

// ── Doorbell detail ─────────────────────────────────────────────────

/// Doorbell connectivity state.
///
/// Battery-powered models drop to `Standby` between events to save
/// power; they still wake up and deliver activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorbellStatus {
    #[serde(rename = "doorbell_call_status_online")]
    Online,
    #[serde(rename = "doorbell_call_status_offline")]
    Offline,
    #[serde(rename = "standby")]
    Standby,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorbellTelemetry {
    #[serde(default)]
    pub battery_soc: Option<u8>,
    #[serde(default)]
    pub wifi_rssi: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentImage {
    pub secure_url: String,
}

/// Full per-doorbell state snapshot (`/doorbells/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorbellDetail {
    #[serde(rename = "doorbellID")]
    pub device_id: String,
    #[serde(rename = "name")]
    pub device_name: String,
    #[serde(rename = "HouseID")]
    pub house_id: String,
    pub status: DoorbellStatus,
    #[serde(rename = "firmwareVersion", default)]
    pub firmware_version: Option<String>,
    #[serde(rename = "serialNumber", default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub telemetry: Option<DoorbellTelemetry>,
    #[serde(rename = "recentImage", default)]
    pub recent_image: Option<RecentImage>,
}

impl DoorbellDetail {
    pub fn is_online(&self) -> bool {
        self.status == DoorbellStatus::Online
    }

    pub fn is_standby(&self) -> bool {
        self.status == DoorbellStatus::Standby
    }

    /// A doorbell counts as reachable when online or in power-saving
    /// standby; standby devices still wake for rings and motion.
    pub fn is_available(&self) -> bool {
        self.is_online() || self.is_standby()
    }

    pub fn battery_percent(&self) -> Option<u8> {
        self.telemetry.as_ref().and_then(|t| t.battery_soc)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.recent_image.as_ref().map(|i| i.secure_url.as_str())
    }
}
