// Gateway: session lifecycle over the raw API client.
//
// Owns the authenticator and the current access token. Everything else
// in this crate borrows the token through here, so a refresh is visible
// to all call sites at once.

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use august_api::auth::{Authentication, AuthenticationState, Authenticator, ValidationResult};
use august_api::client::ApiClient;
use august_api::transport::TransportConfig;

use crate::config::AugustConfig;
use crate::error::CoreError;

/// Authenticated session against the August cloud.
pub struct AugustGateway {
    api: ApiClient,
    authenticator: Authenticator,
    authentication: RwLock<Option<Authentication>>,
    /// Serializes token refresh so concurrent ticks do not both hit the
    /// refresh endpoint.
    refresh_lock: Mutex<()>,
}

impl AugustGateway {
    pub fn new(config: &AugustConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.http_timeout,
            ..TransportConfig::default()
        };
        let api = ApiClient::new(config.api_base_url.clone(), &transport)?;
        let authenticator = Authenticator::new(
            api.clone(),
            config.login_method,
            config.username.clone(),
            config.password.clone(),
            config.install_id.clone(),
            config.access_token_cache_file.clone(),
        );
        Ok(Self {
            api,
            authenticator,
            authentication: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Establish (or restore) a session.
    ///
    /// A bad password or a pending 2FA requirement surfaces as a typed
    /// error so callers can drive the verification flow.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        let authentication = self.authenticator.authenticate().await?;
        match authentication.state {
            AuthenticationState::Authenticated => {
                info!("authenticated with the August cloud");
                *self.authentication.write().await = Some(authentication);
                Ok(())
            }
            AuthenticationState::BadPassword => Err(CoreError::InvalidAuth),
            AuthenticationState::RequiresValidation => Err(CoreError::VerificationRequired),
        }
    }

    /// The current access token.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        self.authentication
            .read()
            .await
            .as_ref()
            .map(|a| a.access_token.clone())
            .ok_or(CoreError::NotAuthenticated)
    }

    /// Refresh the access token when it is close to expiry.
    ///
    /// Serialized: a second caller arriving during a refresh waits, then
    /// finds the token already fresh and returns without a request.
    pub async fn refresh_access_token_if_needed(&self) -> Result<(), CoreError> {
        let needs_refresh = match self.authentication.read().await.as_ref() {
            Some(authentication) => authentication.should_refresh(),
            None => return Err(CoreError::NotAuthenticated),
        };
        if !needs_refresh {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-check under the lock; a concurrent caller may have already
        // refreshed while we waited.
        let current = match self.authentication.read().await.as_ref() {
            Some(authentication) if authentication.should_refresh() => authentication.clone(),
            Some(_) => return Ok(()),
            None => return Err(CoreError::NotAuthenticated),
        };

        debug!("access token near expiry, refreshing");
        let refreshed = self.authenticator.refresh_access_token(&current, false).await?;
        *self.authentication.write().await = Some(refreshed);
        Ok(())
    }

    /// Ask the vendor to send a 2FA verification code.
    pub async fn send_verification_code(&self) -> Result<(), CoreError> {
        self.authenticator.send_verification_code().await?;
        Ok(())
    }

    /// Submit a 2FA verification code received out of band.
    ///
    /// Returns `Ok(true)` when the code was accepted; `Ok(false)` when
    /// rejected (the user retries with a new code).
    pub async fn validate_verification_code(&self, code: &str) -> Result<bool, CoreError> {
        let result = self.authenticator.validate_verification_code(code).await?;
        Ok(result == ValidationResult::Validated)
    }
}
