use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, StudioError};
use crate::types::DEFAULT_BUCKET;

/// Environment variable prefix for configuration overrides, e.g. `STUDIO_DASH_STORE__URL`
pub const ENV_PREFIX: &str = "STUDIO_DASH";
/// Environment variable naming a configuration file
pub const CONFIG_PATH_ENV: &str = "STUDIO_DASH_CONFIG";
/// Fallback source for the store token
pub const TOKEN_ENV: &str = "INFLUXDB_TOKEN";
const DEFAULT_CONFIG_FILE: &str = "./studio-dash.toml";

/// Connection parameters for the time-series store
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the InfluxDB HTTP API
    pub url: String,
    /// API token; never written back out
    #[serde(default, skip_serializing)]
    pub token: String,
    /// Organization the bucket belongs to
    pub org: String,
    pub bucket: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:8086"),
            token: String::new(),
            org: String::new(),
            bucket: String::from(DEFAULT_BUCKET),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("store.url", &self.url),
            ("store.org", &self.org),
            ("store.bucket", &self.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(StudioError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        if self.token.is_empty() {
            return Err(StudioError::InvalidConfig(format!(
                "store.token is not set (configure it or export {})",
                TOKEN_ENV
            )));
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(StudioError::InvalidConfig(format!(
                "store.url must be an http(s) URL, got {}",
                self.url
            )));
        }

        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(StudioError::InvalidConfig(
                "store timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// What to do when a batch holds several readings for the same timestamp and field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Identical duplicates collapse, differing ones are an error
    #[default]
    Reject,
    /// The later reading in batch order replaces the earlier one
    LastWriteWins,
    /// All readings for the cell are averaged
    Mean,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Reject => "reject",
            ConflictPolicy::LastWriteWins => "last_write_wins",
            ConflictPolicy::Mean => "mean",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotConfig {
    pub conflict_policy: ConflictPolicy,
}

/// Web front end settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
        }
    }
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub store: StoreConfig,
    pub pivot: PivotConfig,
    pub server: ServerConfig,
}

/// Environment variables seen by [`DashboardConfig`], captured once per load
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `STUDIO_DASH_*` variables; `None` reads the process environment
    pub vars: Option<config::Map<String, String>>,
    pub config_path: Option<PathBuf>,
    pub token: Option<String>,
}

impl EnvOverrides {
    pub fn from_process() -> Self {
        Self {
            vars: None,
            config_path: std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            token: std::env::var(TOKEN_ENV).ok(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from an explicit file, `STUDIO_DASH_CONFIG`, or `./studio-dash.toml`,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, EnvOverrides::from_process())
    }

    pub fn load_with(path: Option<&Path>, env: EnvOverrides) -> Result<Self> {
        let path = Self::resolve_file(path, env.config_path.clone(), Path::new(DEFAULT_CONFIG_FILE));
        Self::assemble(path.as_deref(), env)
    }

    /// Load configuration from a specific file without environment fallbacks for the file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with(path, EnvOverrides::from_process())
    }

    pub fn from_file_with<P: AsRef<Path>>(path: P, env: EnvOverrides) -> Result<Self> {
        Self::assemble(Some(path.as_ref()), env)
    }

    fn assemble(path: Option<&Path>, env: EnvOverrides) -> Result<Self> {
        let mut config = Self::build(path, env.vars)?;
        config.resolve_token(env.token);
        config.validate()?;
        Ok(config)
    }

    /// Explicit path first, then the path from the environment, then `default` if it exists
    fn resolve_file(
        explicit: Option<&Path>,
        from_env: Option<PathBuf>,
        default: &Path,
    ) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or(from_env)
            .or_else(|| default.exists().then(|| default.to_path_buf()))
    }

    fn build(path: Option<&Path>, env_vars: Option<config::Map<String, String>>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("store.url", defaults.store.url.clone())?
            .set_default("store.org", defaults.store.org.clone())?
            .set_default("store.bucket", defaults.store.bucket.clone())?
            .set_default("store.request_timeout_secs", defaults.store.request_timeout_secs as i64)?
            .set_default("store.connect_timeout_secs", defaults.store.connect_timeout_secs as i64)?
            .set_default("pivot.conflict_policy", defaults.pivot.conflict_policy.as_str())?
            .set_default("server.bind", defaults.server.bind.to_string())?;

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        // Override with environment variables
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env_vars),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Use the fallback token when the configuration layers left it unset
    pub fn resolve_token(&mut self, fallback: Option<String>) {
        if self.store.token.is_empty() {
            if let Some(token) = fallback {
                self.store.token = token;
            }
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.store.validate()
    }
}
