use thiserror::Error;

/// Top-level error type for the `august-api` crate.
///
/// Covers every failure mode across the API surface: transport,
/// authentication, remote-operate, and payload decoding.
/// `august-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success status from the August API.
    #[error("August API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Remote-operate rejected because the lock's bridge is offline,
    /// asleep, or busy. The vendor signals this with HTTP 423 (and
    /// occasionally 408 when the bridge times out mid-operation).
    #[error("Bridge is offline or unavailable (HTTP {status})")]
    BridgeOffline { status: u16 },

    // ── Authentication ──────────────────────────────────────────────
    /// The 2FA verification code was rejected.
    #[error("Invalid verification code")]
    InvalidVerificationCode,

    /// The access-token cache file could not be read or written.
    #[error("Access token cache error: {0}")]
    TokenCache(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` for failures of an individual vendor request that a
    /// batch fetch should isolate (log, mark the device unavailable, keep
    /// going) rather than abort on. Decoding failures are deliberately
    /// excluded: they indicate a data-shape bug, not a transient condition.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Api { .. } | Self::BridgeOffline { .. }
        )
    }

    /// Returns `true` if the remote bridge rejected a lock operation.
    pub fn is_bridge_offline(&self) -> bool {
        matches!(self, Self::BridgeOffline { .. })
    }

    /// Returns `true` if this is a connectivity problem (as opposed to a
    /// structured API rejection).
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
