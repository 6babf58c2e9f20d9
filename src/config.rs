//! Configuration manager for the LDAP backend.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::ConnectionParams;
use crate::error::ConfigError;
use crate::filter::FilterTemplate;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 389;
const DEFAULT_BASE_DN: &str = "dc=domain,dc=local";
const DEFAULT_USER_FILTER: &str = "(mail=%u)";
const DEFAULT_TIMEOUT: u64 = 5;
const DEFAULT_PAGE_SIZE: i32 = 100;

/// LDAP provider configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Hostname of LDAP instance.
    pub host: String,
    pub port: u16,
    /// Upgrade the connection with STARTTLS before binding.
    pub sslmode: bool,
    /// DN under which users are searched.
    pub base_dn: String,
    /// Lookup filter, `%u` is replaced by the escaped username.
    pub user_filter: String,
    /// Service account DN.
    pub user: String,
    /// Service account password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Seconds allowed for connecting and for each directory operation.
    pub timeout: u64,
    /// Entries per search page.
    pub page_size: i32,
    #[serde(skip)]
    pub(crate) path: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            sslmode: false,
            base_dn: DEFAULT_BASE_DN.into(),
            user_filter: DEFAULT_USER_FILTER.into(),
            user: String::default(),
            password: None,
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            path: PathBuf::default(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sslmode", &self.sslmode)
            .field("base_dn", &self.base_dn)
            .field("user_filter", &self.user_filter)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ProviderConfig {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Reads the configuration file from the specified path or the default
    /// location.
    ///
    /// A missing file falls back to defaults. A malformed one is an error.
    pub fn read(self) -> Result<Self, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config: ProviderConfig = match File::open(&file_path) {
            Ok(file) => serde_yaml::from_reader(file)?,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    path = %file_path.display(),
                    "configuration file not found, using defaults"
                );
                return Ok(self);
            },
        };

        config.path = file_path;
        config.validate()?;

        Ok(config)
    }

    /// Compile `user_filter`.
    pub fn filter(&self) -> Result<FilterTemplate, ConfigError> {
        Ok(FilterTemplate::user_filter(&self.user_filter)?)
    }

    /// Transport parameters for one connection.
    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            starttls: self.sslmode,
            timeout: Duration::from_secs(self.timeout),
        }
    }

    /// Reject values the directory would accept but that fail every
    /// verification.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "must be at least one second",
            });
        }

        // A zero size abandons a paged search (RFC 2696).
        if self.page_size < 1 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be at least 1",
            });
        }

        self.filter()?;
        Ok(())
    }
}
