// ── Wire model for the August cloud API ──

pub mod activity;
pub mod device;

pub use activity::{Activity, ActivityType, apply_activity_to_lock_detail};
pub use device::{
    Bridge, Doorbell, DoorbellDetail, DoorbellStatus, DoorbellTelemetry, DoorState, Keypad, Lock,
    LockDetail, LockStatus, LockStatusInfo, RecentImage,
};
