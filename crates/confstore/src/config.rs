//! Service configuration and client connection strings.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use confstore_core::validate_identifier;
use confstore_perms::ProtectionConfig;
use confstore_store::DEFAULT_PAGE_SIZE;

use crate::clients::MAX_CLIENT_ID_LEN;
use crate::error::{Error, Result};
use crate::token::DEFAULT_TOKEN_LIFETIME;

/// Maximum length of a deployment's system id.
pub const MAX_SYSTEM_ID_LEN: usize = 32;

/// Credentials of the client allowed to create other clients.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_system_client_name")]
    pub friendly_name: String,
}

fn default_system_client_name() -> String {
    "System".to_string()
}

impl fmt::Debug for SystemClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClientConfig")
            .field("client_id", &self.client_id)
            .field("friendly_name", &self.friendly_name)
            .finish_non_exhaustive()
    }
}

/// Configuration of one service deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Prefix of every table name of this deployment.
    pub system_id: String,
    pub system_client: SystemClientConfig,
    pub protection: ProtectionConfig,
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_token_lifetime_secs() -> u64 {
    DEFAULT_TOKEN_LIFETIME.as_secs()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl ServiceConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.system_id.is_empty()
            || self.system_id.len() > MAX_SYSTEM_ID_LEN
            || !self.system_id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::Config(format!(
                "system_id must be 1-{} ASCII letters or digits",
                MAX_SYSTEM_ID_LEN
            )));
        }

        validate_identifier("client_id", &self.system_client.client_id, MAX_CLIENT_ID_LEN)
            .map_err(|e| Error::Config(format!("system client: {}", e)))?;
        if self.system_client.client_secret.is_empty() {
            return Err(Error::Config("system client secret must not be empty".into()));
        }

        self.protection
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        if self.token_lifetime_secs == 0 {
            return Err(Error::Config("token_lifetime_secs must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }
}

/// Where and as whom a client connects.
///
/// Textual form: `Endpoint=<url>;ClientId=<id>;ClientSecret=<secret>`.
/// Part names are case-insensitive and may come in any order.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ConnectionString {
    pub fn parse(s: &str) -> Result<Self> {
        let mut endpoint = None;
        let mut client_id = None;
        let mut client_secret = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("connection string part without '=': {}", part)))?;
            let slot = match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => &mut endpoint,
                "clientid" => &mut client_id,
                "clientsecret" => &mut client_secret,
                other => {
                    return Err(Error::Config(format!(
                        "unknown connection string part: {}",
                        other
                    )))
                }
            };
            *slot = Some(value.trim().to_string());
        }

        let require = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("connection string is missing {}", name)))
        };

        Ok(Self {
            endpoint: require(endpoint, "Endpoint")?,
            client_id: require(client_id, "ClientId")?,
            client_secret: require(client_secret, "ClientSecret")?,
        })
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Endpoint={};ClientId={};ClientSecret={}",
            self.endpoint, self.client_id, self.client_secret
        )
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
