// August authentication flows
//
// Session login, access-token refresh, and the 2FA verification-code
// endpoints. A successful login yields a long-lived access token that is
// cached on disk so restarts do not consume the vendor's login quota.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::client::{ACCESS_TOKEN_HEADER, ApiClient, body_preview};
use crate::error::Error;

/// Refresh the token once less than this much validity remains.
const TOKEN_REFRESH_THRESHOLD: TimeDelta = TimeDelta::days(7);

/// How the account identifies itself to the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    Email,
    Phone,
}

impl LoginMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

/// Outcome of a session login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationState {
    Authenticated,
    BadPassword,
    /// The account requires a 2FA verification code before the token
    /// becomes usable; see [`Authenticator::send_verification_code`].
    RequiresValidation,
}

/// Outcome of submitting a 2FA verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Validated,
    InvalidVerificationCode,
}

/// An authenticated (or partially authenticated) session.
#[derive(Debug, Clone)]
pub struct Authentication {
    pub state: AuthenticationState,
    pub access_token: String,
    pub access_token_expires: DateTime<Utc>,
}

impl Authentication {
    pub fn is_expired(&self) -> bool {
        self.access_token_expires <= Utc::now()
    }

    /// Whether the token is close enough to expiry to warrant a refresh.
    pub fn should_refresh(&self) -> bool {
        self.access_token_expires - Utc::now() < TOKEN_REFRESH_THRESHOLD
    }
}

// ── Wire types ──────────────────────────────────────────────────────

/// Session response body. The access token itself arrives in the
/// `x-august-access-token` response header.
#[derive(Deserialize)]
struct SessionWire {
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
    #[serde(rename = "vPassword", default = "default_true")]
    v_password: bool,
    #[serde(rename = "vEmail", default = "default_true")]
    v_email: bool,
    #[serde(rename = "vPhone", default = "default_true")]
    v_phone: bool,
}

fn default_true() -> bool {
    true
}

/// On-disk access-token cache, one file per account.
#[derive(Serialize, Deserialize)]
struct TokenCacheFile {
    access_token: String,
    access_token_expires: DateTime<Utc>,
}

// ── Authenticator ───────────────────────────────────────────────────

/// Owns the credential material and drives the login / refresh /
/// verification flows against the August session endpoints.
pub struct Authenticator {
    api: ApiClient,
    login_method: LoginMethod,
    username: String,
    password: SecretString,
    install_id: String,
    access_token_cache_file: Option<PathBuf>,
}

impl Authenticator {
    pub fn new(
        api: ApiClient,
        login_method: LoginMethod,
        username: impl Into<String>,
        password: SecretString,
        install_id: Option<String>,
        access_token_cache_file: Option<PathBuf>,
    ) -> Self {
        let username = username.into();
        let install_id = install_id.unwrap_or_else(|| derived_install_id(&username));
        Self {
            api,
            login_method,
            username,
            password,
            install_id,
            access_token_cache_file,
        }
    }

    /// Authenticate with the vendor.
    ///
    /// A valid cached token short-circuits the network login entirely.
    /// Otherwise performs a session login; the caller inspects
    /// [`Authentication::state`] for bad-password / needs-verification
    /// outcomes (those are data, not errors, at this layer).
    pub async fn authenticate(&self) -> Result<Authentication, Error> {
        if let Some(cached) = self.read_token_cache() {
            if !cached.is_expired() {
                debug!("using cached access token");
                return Ok(cached);
            }
        }

        let url = self.api.api_url("session");
        debug!("logging in at {url}");

        let body = json!({
            "identifier": format!("{}:{}", self.login_method.as_str(), self.username),
            "password": self.password.expose_secret(),
            "installId": self.install_id,
        });

        let resp = self
            .api
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let authentication = self.parse_session_response(resp).await?;
        if authentication.state == AuthenticationState::Authenticated {
            self.write_token_cache(&authentication);
        }
        Ok(authentication)
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Unless `force` is set, this is a no-op returning the existing
    /// authentication when the token still has comfortable validity.
    pub async fn refresh_access_token(
        &self,
        current: &Authentication,
        force: bool,
    ) -> Result<Authentication, Error> {
        if !force && !current.should_refresh() {
            return Ok(current.clone());
        }

        let url = self.api.api_url("session/refresh");
        debug!("refreshing access token at {url}");

        let resp = self
            .api
            .http()
            .post(url)
            .header(ACCESS_TOKEN_HEADER, &current.access_token)
            .send()
            .await
            .map_err(Error::Transport)?;

        let refreshed = self.parse_session_response(resp).await?;
        self.write_token_cache(&refreshed);
        Ok(refreshed)
    }

    /// Ask the vendor to send a 2FA verification code to the account's
    /// email address or phone number.
    pub async fn send_verification_code(&self) -> Result<(), Error> {
        let url = self
            .api
            .api_url(&format!("validation/{}", self.login_method.as_str()));
        debug!("requesting verification code at {url}");

        let body = json!({ self.login_method.as_str(): self.username });
        let resp = self
            .api
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body_preview(&body).to_owned(),
            });
        }
        Ok(())
    }

    /// Submit a 2FA verification code. A rejected code is a normal
    /// outcome (`ValidationResult::InvalidVerificationCode`), not an
    /// error; the user simply retries.
    pub async fn validate_verification_code(&self, code: &str) -> Result<ValidationResult, Error> {
        let url = self
            .api
            .api_url(&format!("validate/{}", self.login_method.as_str()));
        debug!("validating verification code at {url}");

        let body = json!({
            self.login_method.as_str(): self.username,
            "code": code,
        });
        let resp = self
            .api
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status.is_success() {
            // The verification invalidates any cached token state.
            self.clear_token_cache();
            return Ok(ValidationResult::Validated);
        }
        if status.as_u16() == 422 || status.as_u16() == 400 {
            return Ok(ValidationResult::InvalidVerificationCode);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: body_preview(&body).to_owned(),
        })
    }

    // ── Session response parsing ─────────────────────────────────────

    async fn parse_session_response(&self, resp: reqwest::Response) -> Result<Authentication, Error> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body_preview(&body).to_owned(),
            });
        }

        let access_token = resp
            .headers()
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| Error::Api {
                status: status.as_u16(),
                message: "session response missing access token header".into(),
            })?;

        let body = resp.text().await.map_err(Error::Transport)?;
        let wire: SessionWire = serde_json::from_str(&body).map_err(|e| {
            let preview = body_preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })?;

        let state = if !wire.v_password {
            AuthenticationState::BadPassword
        } else {
            let verified = match self.login_method {
                LoginMethod::Email => wire.v_email,
                LoginMethod::Phone => wire.v_phone,
            };
            if verified {
                AuthenticationState::Authenticated
            } else {
                AuthenticationState::RequiresValidation
            }
        };

        Ok(Authentication {
            state,
            access_token,
            access_token_expires: wire.expires_at,
        })
    }

    // ── Token cache file ─────────────────────────────────────────────

    /// A corrupt or unreadable cache is treated as absent; the login
    /// path rewrites it.
    fn read_token_cache(&self) -> Option<Authentication> {
        let path = self.access_token_cache_file.as_deref()?;
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<TokenCacheFile>(&contents) {
            Ok(cached) => Some(Authentication {
                state: AuthenticationState::Authenticated,
                access_token: cached.access_token,
                access_token_expires: cached.access_token_expires,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt token cache");
                None
            }
        }
    }

    fn write_token_cache(&self, authentication: &Authentication) {
        let Some(path) = self.access_token_cache_file.as_deref() else {
            return;
        };
        if let Err(e) = try_write_cache(path, authentication) {
            warn!(path = %path.display(), error = %e, "failed to write token cache");
        }
    }

    fn clear_token_cache(&self) {
        if let Some(path) = self.access_token_cache_file.as_deref() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn try_write_cache(path: &Path, authentication: &Authentication) -> Result<(), Error> {
    let cached = TokenCacheFile {
        access_token: authentication.access_token.clone(),
        access_token_expires: authentication.access_token_expires,
    };
    let contents =
        serde_json::to_string_pretty(&cached).map_err(|e| Error::TokenCache(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| Error::TokenCache(e.to_string()))
}

/// Stable per-account install id when the caller does not supply one.
fn derived_install_id(username: &str) -> String {
    let mut hasher = DefaultHasher::new();
    username.hash(&mut hasher);
    format!("august-rs-{:016x}", hasher.finish())
}
