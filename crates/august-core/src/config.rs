// Core configuration
//
// One struct carries everything the facade needs to stand up a session:
// credentials, endpoint, and the polling cadences. Defaults match the
// vendor's tolerated request rates.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use august_api::auth::LoginMethod;
use august_api::client::DEFAULT_BASE_URL;

/// How often the activity feed is polled.
pub const DEFAULT_ACTIVITY_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum spacing between full detail refreshes. Between refreshes the
/// cache serves stored snapshots patched from activity records.
pub const DEFAULT_DETAIL_UPDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`AugustData`](crate::data::AugustData).
#[derive(Debug, Clone)]
pub struct AugustConfig {
    pub login_method: LoginMethod,
    pub username: String,
    pub password: SecretString,
    /// Stable per-installation id sent with the login; derived from the
    /// username when absent.
    pub install_id: Option<String>,
    /// Where to persist the access token between runs. `None` disables
    /// the cache.
    pub access_token_cache_file: Option<PathBuf>,
    pub api_base_url: Url,
    pub http_timeout: Duration,
    pub activity_update_interval: Duration,
    pub detail_update_interval: Duration,
}

impl AugustConfig {
    /// Build a config with production defaults for the given account.
    pub fn new(login_method: LoginMethod, username: impl Into<String>, password: SecretString) -> Self {
        let username = username.into();
        let cache_file = PathBuf::from(format!(".{username}.august.conf"));
        let api_base_url = Url::parse(DEFAULT_BASE_URL).expect("default base URL parses");
        Self {
            login_method,
            username,
            password,
            install_id: None,
            access_token_cache_file: Some(cache_file),
            api_base_url,
            http_timeout: Duration::from_secs(10),
            activity_update_interval: DEFAULT_ACTIVITY_UPDATE_INTERVAL,
            detail_update_interval: DEFAULT_DETAIL_UPDATE_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.api_base_url = base_url;
        self
    }

    pub fn with_install_id(mut self, install_id: impl Into<String>) -> Self {
        self.install_id = Some(install_id.into());
        self
    }

    pub fn with_token_cache_file(mut self, path: Option<PathBuf>) -> Self {
        self.access_token_cache_file = path;
        self
    }

    pub fn with_activity_update_interval(mut self, interval: Duration) -> Self {
        self.activity_update_interval = interval;
        self
    }

    pub fn with_detail_update_interval(mut self, interval: Duration) -> Self {
        self.detail_update_interval = interval;
        self
    }
}
