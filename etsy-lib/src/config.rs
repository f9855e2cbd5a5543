//! File based configuration.
//!
//! A [`Config`] is read from TOML and turned into a [`ClientBuilder`]:
//!
//! ```toml
//! api_key_file = "~/.config/etsy/api_key"
//! environment = "production"
//! timeout = "20s"
//! method_cache = "~/.cache/etsy/methods.json"
//!
//! [rate_limit]
//! max_clients = 5
//! period = "1s"
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::ratelimit::RateLimitConfig;
use crate::client::DEFAULT_USER_AGENT;
use crate::{ClientBuilder, ErrorKind, Result};

/// The Etsy API environment to talk to
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    /// The sandbox, for development
    #[default]
    Sandbox,
    /// The live API
    Production,
}

impl Environment {
    /// Base URL of the API version 2 in this environment
    #[must_use]
    pub const fn api_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.openapi.etsy.com/v2",
            Self::Production => "https://openapi.etsy.com/v2",
        }
    }
}

/// Client configuration as read from a TOML file.
///
/// Every field is optional; missing values fall back to the
/// [`ClientBuilder`] defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// API key sent with every request
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,

    /// File to read the API key from if `api_key` is not set
    pub api_key_file: Option<PathBuf>,

    /// Environment whose base URL is used
    #[serde(default)]
    pub environment: Environment,

    /// Explicit base URL, overriding `environment`
    pub base_url: Option<Url>,

    /// Rate limiting of outgoing requests
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Timeout of a single request
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// User agent sent with every request
    pub user_agent: Option<String>,

    /// File caching the method table between runs
    pub method_cache: Option<PathBuf>,
}

impl Config {
    /// Parse a configuration from TOML
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Config`] if `contents` is not a valid
    /// configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the file cannot be read and
    /// [`ErrorKind::Config`] if it cannot be parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ErrorKind::Io(path.to_path_buf(), e))?;
        Self::from_toml(&contents)
    }

    /// A [`ClientBuilder`] carrying this configuration
    #[must_use]
    pub fn client_builder(self) -> ClientBuilder {
        let Self {
            api_key,
            api_key_file,
            environment,
            base_url,
            rate_limit,
            timeout,
            user_agent,
            method_cache,
        } = self;
        ClientBuilder::builder()
            .api_key(api_key)
            .api_key_file(api_key_file.map(expand_path))
            .environment(environment)
            .base_url(base_url)
            .rate_limit(rate_limit)
            .timeout(timeout)
            .user_agent(user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
            .method_cache(method_cache.map(expand_path))
            .build()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Expand a leading `~` to the home directory
pub(crate) fn expand_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
        None => path,
    }
}
