use crate::consts::{ACCOUNTS_HOST, PHOTOS_HOST, USER_AGENT};
use crate::errors::{APIError, Result};
use log::error;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hosts and client identity used for every request.
///
/// Endpoint paths are fixed by the protocol; only the hosts are configurable,
/// which lets a proxy or a test server stand in for the real service.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub photos_host: String,
    pub accounts_host: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_owned(),
            photos_host: PHOTOS_HOST.to_owned(),
            accounts_host: ACCOUNTS_HOST.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Reads a configuration file, falling back to the defaults when the file
    /// is missing. Fields absent from the file keep their default value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| {
            error!("Couldn't parse config file {}: {e}", path.display());
            APIError::Config(format!("invalid config file {}: {e}", path.display()))
        })
    }

    pub(crate) fn photos_url(&self, endpoint: &str) -> Result<Url> {
        join(&self.photos_host, endpoint)
    }

    pub(crate) fn accounts_url(&self, endpoint: &str) -> Result<Url> {
        join(&self.accounts_host, endpoint)
    }
}

fn join(host: &str, endpoint: &str) -> Result<Url> {
    Url::parse(host)
        .and_then(|base| base.join(endpoint))
        .map_err(|_| APIError::UrlError(format!("{host}{endpoint}")))
}
