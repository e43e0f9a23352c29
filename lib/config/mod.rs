use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str =
    "https://us-central1-tech-interview-api.cloudfunctions.net/base/api";
pub const DEFAULT_DATACENTERS_PATH: &str = "./data/datacenters.json";
pub const DEFAULT_BUILDINGS_PATH: &str = "./data/buildings.json";
/// Spacing between the start of consecutive requests in one batch.
pub const DELAY_INCREMENT: Duration = Duration::from_millis(750);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),

    #[error("Invalid value for DELAY_INCREMENT_MS: {0}")]
    InvalidDelayIncrement(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base url of the remote api, without trailing slash.
    pub api_url: String,
    pub datacenters_path: PathBuf,
    pub buildings_path: PathBuf,
    /// Default: 750ms
    pub delay_increment: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            datacenters_path: PathBuf::from(DEFAULT_DATACENTERS_PATH),
            buildings_path: PathBuf::from(DEFAULT_BUILDINGS_PATH),
            delay_increment: DELAY_INCREMENT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let api_url = optional(&lookup, "API_URL")?
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let datacenters_path = optional(&lookup, "DATACENTERS_PATH")?
            .unwrap_or_else(|| DEFAULT_DATACENTERS_PATH.to_string());

        let buildings_path = optional(&lookup, "BUILDINGS_PATH")?
            .unwrap_or_else(|| DEFAULT_BUILDINGS_PATH.to_string());

        let delay_increment = match optional(&lookup, "DELAY_INCREMENT_MS")? {
            Some(val) => val
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDelayIncrement(val))?,
            None => DELAY_INCREMENT,
        };

        Ok(Self {
            api_url,
            datacenters_path: PathBuf::from(datacenters_path),
            buildings_path: PathBuf::from(buildings_path),
            delay_increment,
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
