//! Session configuration

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use crate::error::{Result, TinyCertError};

/// Production API root
pub const DEFAULT_SERVER_URL: &str = "https://www.tinycert.org/api/v1/";

pub const ENV_EMAIL: &str = "TINYCERT_EMAIL";
pub const ENV_PASSPHRASE: &str = "TINYCERT_PASSWORD";
pub const ENV_API_KEY: &str = "TINYCERT_APIKEY";
pub const ENV_SERVER_URL: &str = "TINYCERT_SERVER";

/// Credentials and endpoint for one [`Session`](crate::Session)
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub email: String,
    pub passphrase: String,
    pub api_key: String,
    /// API root; endpoint names are appended to it
    pub server_url: String,
    /// Per-request timeout, stored as whole seconds
    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_timeout",
        deserialize_with = "deserialize_timeout"
    )]
    pub timeout: Duration,
}

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn serialize_timeout<S>(timeout: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(timeout.as_secs())
}

/// Whole seconds; zero would make every request time out at once
fn deserialize_timeout<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match u64::deserialize(deserializer)? {
        0 => Err(de::Error::invalid_value(
            de::Unexpected::Unsigned(0),
            &"a timeout of at least one second",
        )),
        secs => Ok(Duration::from_secs(secs)),
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("email", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            passphrase: String::new(),
            api_key: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Read credentials from `TINYCERT_EMAIL`, `TINYCERT_PASSWORD` and
    /// `TINYCERT_APIKEY`, and the server from `TINYCERT_SERVER` if set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder()
            .email(lookup(ENV_EMAIL).unwrap_or_default())
            .passphrase(lookup(ENV_PASSPHRASE).unwrap_or_default())
            .api_key(lookup(ENV_API_KEY).unwrap_or_default());

        if let Some(server) = lookup(ENV_SERVER_URL).filter(|s| !s.is_empty()) {
            builder = builder.server_url(server);
        }

        builder.build()
    }

    /// Full URL of an endpoint such as `ca/list`
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.server_url, endpoint)
    }
}

/// Builder for SessionConfig
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.config.email = email.into();
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.config.passphrase = passphrase.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.config.server_url = server_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(mut self) -> Result<SessionConfig> {
        if self.config.email.is_empty() {
            return Err(TinyCertError::Config("email is required".to_string()));
        }
        if self.config.passphrase.is_empty() {
            return Err(TinyCertError::Config("passphrase is required".to_string()));
        }
        if self.config.api_key.is_empty() {
            return Err(TinyCertError::Config("api_key is required".to_string()));
        }
        if self.config.server_url.is_empty() {
            return Err(TinyCertError::Config("server_url is required".to_string()));
        }
        if !self.config.server_url.ends_with('/') {
            self.config.server_url.push('/');
        }
        Ok(self.config)
    }
}
