//! Async client for the August smart-lock / doorbell cloud API.
//!
//! This crate owns the wire contract only: typed request/response
//! models, URL construction, status-code mapping, and the
//! authentication flows (session login, token refresh, 2FA
//! verification, on-disk token cache). Caching, throttling, and
//! lifecycle policy live in `august-core`.

pub mod auth;
pub mod client;
pub mod error;
pub mod model;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{
    Authentication, AuthenticationState, Authenticator, LoginMethod, ValidationResult,
};
pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::Error;
pub use model::{
    Activity, ActivityType, Bridge, Doorbell, DoorbellDetail, DoorbellStatus, DoorState, Keypad,
    Lock, LockDetail, LockStatus, apply_activity_to_lock_detail,
};
pub use transport::TransportConfig;
