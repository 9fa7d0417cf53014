use thiserror::Error;

/// Top-level error type for the `august-core` crate.
///
/// Wire-level failures from `august-api` are mapped into the categories
/// an integration surface cares about: connectivity, credentials, and
/// per-device operability.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connectivity ────────────────────────────────────────────────
    /// The August cloud could not be reached.
    #[error("Cannot connect to the August cloud: {reason}")]
    CannotConnect { reason: String },

    // ── Credentials ─────────────────────────────────────────────────
    /// The account password was rejected.
    #[error("Invalid authentication credentials")]
    InvalidAuth,

    /// The account requires a 2FA verification code before it can be
    /// used; request one and validate it, then retry setup.
    #[error("Account verification required")]
    VerificationRequired,

    /// An operation was attempted before a successful `authenticate`.
    #[error("Not authenticated")]
    NotAuthenticated,

    // ── Devices ─────────────────────────────────────────────────────
    /// A remote operation was rejected because the device's bridge is
    /// offline, asleep, or busy.
    #[error("Unable to {operation} \"{device_name}\": the bridge is offline or unavailable")]
    BridgeUnavailable {
        device_name: String,
        operation: String,
    },

    /// The device id is not in the tracked set.
    #[error("Unknown device: {device_id}")]
    DeviceNotFound { device_id: String },

    /// A remote operation was attempted on a device that is not a lock.
    #[error("Device {device_id} is not a remotely operable lock")]
    NotALock { device_id: String },

    // ── Vendor API ──────────────────────────────────────────────────
    /// Structured rejection from the vendor API.
    #[error("August API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The access-token cache file could not be read or written.
    #[error("Access token cache error: {message}")]
    TokenCache { message: String },

    /// A payload from the vendor did not match the expected shape.
    #[error("Unexpected API response: {message}")]
    UnexpectedResponse { message: String },
}

impl From<august_api::Error> for CoreError {
    fn from(e: august_api::Error) -> Self {
        use august_api::Error;
        match e {
            Error::Transport(_) | Error::InvalidUrl(_) => Self::CannotConnect {
                reason: e.to_string(),
            },
            // 401 on an established session means the token died; the
            // caller re-authenticates.
            Error::Api { status: 401, .. } => Self::InvalidAuth,
            Error::Api { status, message } => Self::Api { status, message },
            Error::BridgeOffline { .. } => Self::BridgeUnavailable {
                device_name: String::new(),
                operation: String::new(),
            },
            Error::InvalidVerificationCode => Self::VerificationRequired,
            Error::TokenCache(message) => Self::TokenCache { message },
            Error::Deserialization { message, .. } => Self::UnexpectedResponse { message },
        }
    }
}

impl CoreError {
    /// Attach device context to a bare `BridgeUnavailable` produced by
    /// the blanket `From` conversion.
    pub(crate) fn with_device_context(self, device_name: &str, operation: &str) -> Self {
        match self {
            Self::BridgeUnavailable { .. } => Self::BridgeUnavailable {
                device_name: device_name.to_owned(),
                operation: operation.to_owned(),
            },
            other => other,
        }
    }
}
