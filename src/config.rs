//! Connection profiles and upload settings loaded from the JSON credentials file.

use crate::error::ConnectError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// File name looked up next to the executable when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "data_warehouse_creds.json";

/// Rows per bulk submission before the dataset is split.
pub const DEFAULT_CHUNK_THRESHOLD: usize = 500_000;

/// Identity column never populated by uploads.
pub const DEFAULT_SURROGATE_KEY: &str = "ID";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a profile's database lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectDescriptor {
    pub host: String,
    pub port: u16,
    pub sid: String,
    /// Local database file for embedded backends.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl ConnectDescriptor {
    /// Easy-connect string, `host:port/sid`.
    pub fn dsn(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.sid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadSettings {
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold: usize,
    #[serde(default = "default_surrogate_key")]
    pub surrogate_key: String,
}

fn default_chunk_threshold() -> usize {
    DEFAULT_CHUNK_THRESHOLD
}

fn default_surrogate_key() -> String {
    DEFAULT_SURROGATE_KEY.to_string()
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            surrogate_key: DEFAULT_SURROGATE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub credentials: HashMap<String, Credentials>,
    pub connections: HashMap<String, ConnectDescriptor>,
    #[serde(default)]
    pub upload: UploadSettings,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid warehouse configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Resolve both halves of a target to concrete settings.
    pub fn resolve(
        &self,
        target: &Target,
    ) -> Result<(&ConnectDescriptor, &Credentials), ConnectError> {
        let conn_key = target.connection.as_str();
        let cred_key = target.credentials.as_str();
        let descriptor = self
            .connections
            .get(conn_key)
            .ok_or_else(|| ConnectError::MissingProfile(format!("connections.{conn_key}")))?;
        let credentials = self
            .credentials
            .get(cred_key)
            .ok_or_else(|| ConnectError::MissingProfile(format!("credentials.{cred_key}")))?;
        Ok((descriptor, credentials))
    }
}

/// `data_warehouse_creds.json` beside the running binary, falling back to the
/// working directory when the executable path is unavailable.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(DEFAULT_CONFIG_FILE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionProfile {
    #[default]
    Prod,
    Dev,
}

impl ConnectionProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionProfile::Prod => "prod",
            ConnectionProfile::Dev => "dev",
        }
    }
}

impl FromStr for ConnectionProfile {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" => Ok(ConnectionProfile::Prod),
            "dev" => Ok(ConnectionProfile::Dev),
            _ => Err(ConnectError::UnknownConnection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CredentialsProfile {
    #[default]
    Public,
    Private,
}

impl CredentialsProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialsProfile::Public => "public",
            CredentialsProfile::Private => "private",
        }
    }
}

impl FromStr for CredentialsProfile {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(CredentialsProfile::Public),
            "private" => Ok(CredentialsProfile::Private),
            _ => Err(ConnectError::UnknownCredentials(s.to_string())),
        }
    }
}

/// The profile pair every operation is called with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    pub connection: ConnectionProfile,
    pub credentials: CredentialsProfile,
}

impl Target {
    pub fn new(connection: ConnectionProfile, credentials: CredentialsProfile) -> Self {
        Self {
            connection,
            credentials,
        }
    }

    /// Parse both profile names, case-insensitively.
    pub fn parse(connection: &str, credentials: &str) -> Result<Self, ConnectError> {
        Ok(Self::new(connection.parse()?, credentials.parse()?))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection.as_str(), self.credentials.as_str())
    }
}
