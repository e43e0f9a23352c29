use crate::batch::BatchOptions;
use crate::build_info;
use crate::config::Config;
use crate::import::ImportOptions;
use crate::request::{RequestOptions, RetryPolicy};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    about = "Imports datacenter records into the datacenter api",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[clap(long)]
    /// Base url of the api, overrides API_URL
    pub api_url: Option<String>,

    #[clap(long)]
    /// Datacenters export, overrides DATACENTERS_PATH
    pub datacenters: Option<PathBuf>,

    #[clap(long)]
    /// Buildings export, overrides BUILDINGS_PATH
    pub buildings: Option<PathBuf>,

    #[clap(long)]
    /// Milliseconds between request starts within a batch, overrides DELAY_INCREMENT_MS
    pub delay_ms: Option<u64>,

    #[clap(long, default_value_t = 1)]
    /// Attempts per request for 408, 429 and 5xx responses. 1 disables retries
    pub retry_attempts: u32,

    #[clap(long, default_value_t = 250)]
    /// Backoff before the first retry
    pub retry_initial_ms: u64,

    #[clap(long, default_value_t = 5_000)]
    /// Upper bound for retry backoff
    pub retry_max_ms: u64,

    #[clap(long)]
    /// Resolve building ids and convert dates before import
    pub normalize: bool,

    #[clap(long)]
    /// Log every response and body
    pub log_responses: bool,

    #[clap(long)]
    /// Abort on the first transport failure instead of recording it
    pub no_suppress_errors: bool,

    #[clap(short, long)]
    /// Don't log batch start/progress/completion lines
    pub quiet_progress: bool,

    #[clap(long)]
    /// Log when each batch starts and completes
    pub log_timing: bool,

    #[clap(long)]
    /// Skip the status code, error and validation summaries
    pub no_summary: bool,

    #[clap(long, default_value = "info")]
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.retry_attempts == 0 {
            return Err("--retry-attempts must be > 0".to_string());
        }
        if self.retry_max_ms < self.retry_initial_ms {
            return Err(format!(
                "--retry-max-ms ({}) must be >= --retry-initial-ms ({})",
                self.retry_max_ms, self.retry_initial_ms
            ));
        }
        Ok(())
    }

    /// Applies command line overrides on top of the environment config.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = &self.datacenters {
            config.datacenters_path = path.clone();
        }
        if let Some(path) = &self.buildings {
            config.buildings_path = path.clone();
        }
        if let Some(ms) = self.delay_ms {
            config.delay_increment = Duration::from_millis(ms);
        }
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.retry_initial_ms),
            max_backoff: Duration::from_millis(self.retry_max_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            log_timing: self.log_timing,
            log_postprocess: !self.no_summary,
            normalize: self.normalize,
            batch: BatchOptions {
                log_progress: !self.quiet_progress,
                request: RequestOptions {
                    suppress_errors: !self.no_suppress_errors,
                    log_response: self.log_responses,
                    retry_policy: self.retry_policy(),
                },
                ..BatchOptions::default()
            },
            ..ImportOptions::default()
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
