//! Device state cache and activity-stream reconciliation for the
//! August smart-lock / doorbell cloud.
//!
//! [`AugustData`] is the entry point: it authenticates through the
//! [`gateway`], discovers the account's devices, primes the throttled
//! [`detail`] cache, and starts the [`activity`] poll loop that keeps
//! cached state fresh between expensive detail refreshes. Consumers
//! read cached snapshots and [`subscribe`] to per-device change
//! signals.

pub mod activity;
pub mod config;
pub mod data;
pub mod detail;
pub mod device;
pub mod error;
pub mod gateway;
pub mod subscribe;

mod throttle;

// ── Primary re-exports ──────────────────────────────────────────────
pub use activity::{ActivityStream, ActivityStreamHandle};
pub use config::{
    AugustConfig, DEFAULT_ACTIVITY_UPDATE_INTERVAL, DEFAULT_DETAIL_UPDATE_INTERVAL,
};
pub use data::AugustData;
pub use detail::DetailCache;
pub use device::{Device, DeviceDetail};
pub use error::CoreError;
pub use gateway::AugustGateway;
pub use subscribe::DeviceUpdateBus;

// Wire types consumers handle directly.
pub use august_api::auth::LoginMethod;
pub use august_api::model::{
    Activity, ActivityType, Doorbell, DoorbellDetail, DoorState, Lock, LockDetail, LockStatus,
};
