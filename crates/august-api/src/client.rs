// August cloud API HTTP client
//
// Wraps `reqwest::Client` with August-specific URL construction, access
// token injection, and status-code mapping. Responses have no envelope;
// bodies deserialize directly into the wire model types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::{Activity, ActivityType, Doorbell, DoorbellDetail, Lock, LockDetail};
use crate::model::device::{DoorState, LockStatus};
use crate::transport::TransportConfig;

/// Production endpoint of the August cloud.
pub const DEFAULT_BASE_URL: &str = "https://api-production.august.com";

/// Per-request access token header.
pub(crate) const ACCESS_TOKEN_HEADER: &str = "x-august-access-token";

/// Raw HTTP client for the August cloud API.
///
/// Holds no session state beyond the HTTP connection pool; the access
/// token is passed per call so one client can serve many sessions.
/// Cheap to clone (`reqwest::Client` is an `Arc` internally).
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

// Discovery endpoints return maps keyed by device id; the values carry
// the rest of the record.
#[derive(Deserialize)]
struct LockInfoWire {
    #[serde(rename = "LockName", default)]
    lock_name: String,
    #[serde(rename = "HouseID")]
    house_id: String,
    #[serde(rename = "UserType", default)]
    user_type: String,
}

#[derive(Deserialize)]
struct DoorbellInfoWire {
    #[serde(default)]
    name: String,
    #[serde(rename = "HouseID")]
    house_id: String,
    #[serde(rename = "serialNumber", default)]
    serial_number: Option<String>,
}

/// Response body of `PUT /remoteoperate/{id}/{op}`.
#[derive(Deserialize)]
struct RemoteOperateWire {
    status: LockStatus,
    #[serde(rename = "dateTime", default)]
    date_time: Option<DateTime<Utc>>,
    #[serde(rename = "doorState", default)]
    door_state: Option<DoorState>,
}

impl ApiClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client (for the auth flows).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build a full URL for an API path.
    pub(crate) fn api_url(&self, path: &str) -> Url {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/{path}");
        Url::parse(&full).expect("invalid API URL")
    }

    // ── Device discovery ─────────────────────────────────────────────

    /// List locks the account can operate remotely.
    ///
    /// The discovery endpoint returns every lock visible to the account;
    /// locks where the account is not a superuser cannot be operated and
    /// are filtered out here.
    pub async fn get_operable_locks(&self, access_token: &str) -> Result<Vec<Lock>, Error> {
        let url = self.api_url("users/locks/mine");
        let raw: HashMap<String, LockInfoWire> = self.get_json(url, access_token).await?;

        Ok(raw
            .into_iter()
            .map(|(device_id, info)| Lock {
                device_id,
                device_name: info.lock_name,
                house_id: info.house_id,
                user_type: info.user_type,
            })
            .filter(Lock::is_operable)
            .collect())
    }

    /// List the account's doorbells.
    pub async fn get_doorbells(&self, access_token: &str) -> Result<Vec<Doorbell>, Error> {
        let url = self.api_url("users/doorbells/mine");
        let raw: HashMap<String, DoorbellInfoWire> = self.get_json(url, access_token).await?;

        Ok(raw
            .into_iter()
            .map(|(device_id, info)| Doorbell {
                device_id,
                device_name: info.name,
                house_id: info.house_id,
                serial_number: info.serial_number,
            })
            .collect())
    }

    // ── Detail snapshots ─────────────────────────────────────────────

    /// Fetch the full state snapshot for a lock.
    pub async fn get_lock_detail(
        &self,
        access_token: &str,
        lock_id: &str,
    ) -> Result<LockDetail, Error> {
        let url = self.api_url(&format!("locks/{lock_id}"));
        self.get_json(url, access_token).await
    }

    /// Fetch the full state snapshot for a doorbell.
    pub async fn get_doorbell_detail(
        &self,
        access_token: &str,
        doorbell_id: &str,
    ) -> Result<DoorbellDetail, Error> {
        let url = self.api_url(&format!("doorbells/{doorbell_id}"));
        self.get_json(url, access_token).await
    }

    // ── Activity feed ────────────────────────────────────────────────

    /// Fetch the most recent activities for a house, newest first.
    pub async fn get_house_activities(
        &self,
        access_token: &str,
        house_id: &str,
        limit: u32,
    ) -> Result<Vec<Activity>, Error> {
        let mut url = self.api_url(&format!("houses/{house_id}/activities"));
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get_json(url, access_token).await
    }

    // ── Remote operation ─────────────────────────────────────────────

    /// Lock a lock. Returns the activity records implied by the new
    /// state so callers can merge them into cached details immediately.
    pub async fn lock(&self, access_token: &str, lock_id: &str) -> Result<Vec<Activity>, Error> {
        self.remote_operate(access_token, lock_id, "lock").await
    }

    /// Unlock a lock. Returns the implied activity records.
    pub async fn unlock(&self, access_token: &str, lock_id: &str) -> Result<Vec<Activity>, Error> {
        self.remote_operate(access_token, lock_id, "unlock").await
    }

    async fn remote_operate(
        &self,
        access_token: &str,
        lock_id: &str,
        operation: &str,
    ) -> Result<Vec<Activity>, Error> {
        let url = self.api_url(&format!("remoteoperate/{lock_id}/{operation}"));
        debug!("PUT {url}");

        let resp = self
            .http
            .put(url)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .send()
            .await
            .map_err(Error::Transport)?;

        let wire: RemoteOperateWire = Self::parse_body(resp).await?;
        Ok(activities_from_operate(lock_id, &wire))
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, url: Url, access_token: &str) -> Result<T, Error> {
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_body(resp).await
    }

    /// Map the status code, then deserialize the body.
    ///
    /// HTTP 423 (and 408 mid-operation) come from remote-operate when the
    /// lock's bridge is offline, asleep, or already busy.
    async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status().as_u16();

        if status == 423 || status == 408 {
            return Err(Error::BridgeOffline { status });
        }

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body_preview(&body).to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = body_preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}

/// Clip an error body for diagnostics without splitting a UTF-8 char.
pub(crate) fn body_preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Synthesize activity records from a remote-operate response, shaped
/// like the feed records the next activity poll would deliver. The feed
/// name is unknown at this layer; the facade fills it from discovery.
fn activities_from_operate(lock_id: &str, wire: &RemoteOperateWire) -> Vec<Activity> {
    let at = wire.date_time.unwrap_or_else(Utc::now);

    let action = match wire.status {
        LockStatus::Locked => "lock",
        LockStatus::Unlocked => "unlock",
        LockStatus::Unknown => "unknown",
    };

    let mut activities = vec![Activity {
        device_id: lock_id.to_owned(),
        device_name: String::new(),
        activity_type: ActivityType::LockOperation,
        action: action.to_owned(),
        activity_start_time: at,
        activity_end_time: at,
        operated_by: None,
        operated_remote: Some(true),
        operated_keypad: None,
        image_url: None,
    }];

    if let Some(door_state) = wire.door_state {
        let action = match door_state {
            DoorState::Open => "dooropen",
            DoorState::Closed => "doorclosed",
            DoorState::Unknown => return activities,
        };
        activities.push(Activity {
            device_id: lock_id.to_owned(),
            device_name: String::new(),
            activity_type: ActivityType::DoorOperation,
            action: action.to_owned(),
            activity_start_time: at,
            activity_end_time: at,
            operated_by: None,
            operated_remote: Some(true),
            operated_keypad: None,
            image_url: None,
        });
    }

    activities
}
