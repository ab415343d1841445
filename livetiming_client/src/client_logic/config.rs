use clap::Parser;
use lib_livetiming::service::endpoint_for_base;
use lib_livetiming::ServiceOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "livetiming_client.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Live timing stream client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "LIVETIMING_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LIVETIMING_URL", help = "Full URL of the realtime event stream.")]
    pub url: Option<String>,

    #[clap(long, env = "LIVETIMING_BASE_URL", help = "API base URL; the realtime path is appended. Ignored when --url is set.")]
    pub base_url: Option<String>,

    #[clap(long, env = "LIVETIMING_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LIVETIMING_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "LIVETIMING_DEBUG", help = "Enable component diagnostics (true/false).")]
    pub debug: Option<bool>,

    #[clap(long, env = "LIVETIMING_MAX_RETRIES", help = "Automatic reconnect attempts before giving up.")]
    pub max_retries: Option<u32>,

    #[clap(long, env = "LIVETIMING_INITIAL_RETRY_DELAY_MS", help = "Delay in milliseconds before the first reconnect attempt.")]
    pub initial_retry_delay_ms: Option<u64>,

    #[clap(long, env = "LIVETIMING_MAX_RETRY_DELAY_MS", help = "Upper bound in milliseconds for a reconnect delay.")]
    pub max_retry_delay_ms: Option<u64>,

    #[clap(long, env = "LIVETIMING_RETRY_MULTIPLIER", help = "Backoff growth factor per attempt.")]
    pub retry_multiplier: Option<f64>,

    #[clap(long, env = "LIVETIMING_ENABLE_SNAPSHOT", help = "Keep a bounded history of past states (true/false).")]
    pub enable_snapshot: Option<bool>,

    #[clap(long, env = "LIVETIMING_MAX_SNAPSHOTS", help = "Number of snapshots kept when history is enabled.")]
    pub max_snapshots: Option<usize>,

    #[clap(long, env = "LIVETIMING_STRICT", help = "Report handler failures as errors instead of dropping the payload (true/false).")]
    pub strict: Option<bool>,

    #[clap(long, env = "LIVETIMING_SUMMARY_INTERVAL_SECONDS", help = "Seconds between state summaries in the log.")]
    pub summary_interval_seconds: Option<u64>,
}

impl Config {
    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            url: other.url.or(self.url),
            base_url: other.base_url.or(self.base_url),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            debug: other.debug.or(self.debug),
            max_retries: other.max_retries.or(self.max_retries),
            initial_retry_delay_ms: other.initial_retry_delay_ms.or(self.initial_retry_delay_ms),
            max_retry_delay_ms: other.max_retry_delay_ms.or(self.max_retry_delay_ms),
            retry_multiplier: other.retry_multiplier.or(self.retry_multiplier),
            enable_snapshot: other.enable_snapshot.or(self.enable_snapshot),
            max_snapshots: other.max_snapshots.or(self.max_snapshots),
            strict: other.strict.or(self.strict),
            summary_interval_seconds: other.summary_interval_seconds.or(self.summary_interval_seconds),
        }
    }

    // A base URL without a url in the same layer beats an earlier url.
    fn layer(mut self, other: Config) -> Config {
        if other.url.is_none() && other.base_url.is_some() {
            self.url = None;
        }
        self.merge(other)
    }

    fn defaults() -> Config {
        let options = ServiceOptions::default();
        Config {
            url: Some(options.url),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            debug: Some(false),
            max_retries: Some(options.connection.max_retries),
            initial_retry_delay_ms: Some(options.connection.initial_retry_delay_ms),
            max_retry_delay_ms: Some(options.connection.max_retry_delay_ms),
            retry_multiplier: Some(options.connection.retry_multiplier),
            enable_snapshot: Some(options.store.enable_snapshot),
            max_snapshots: Some(options.store.max_snapshots),
            strict: Some(false),
            summary_interval_seconds: Some(30),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Stream URL. An explicit `url` wins over `base_url`.
    pub fn stream_url(&self) -> String {
        match (&self.url, &self.base_url) {
            (Some(url), _) => url.clone(),
            (None, Some(base)) => endpoint_for_base(base),
            (None, None) => ServiceOptions::default().url,
        }
    }

    /// Builds the library options. Unset fields keep the library defaults.
    pub fn to_service_options(&self) -> ServiceOptions {
        let mut options = ServiceOptions::default().with_debug(self.debug.unwrap_or(false));
        options.url = self.stream_url();

        let connection = &mut options.connection;
        if let Some(v) = self.max_retries {
            connection.max_retries = v;
        }
        if let Some(v) = self.initial_retry_delay_ms {
            connection.initial_retry_delay_ms = v;
        }
        if let Some(v) = self.max_retry_delay_ms {
            connection.max_retry_delay_ms = v;
        }
        if let Some(v) = self.retry_multiplier {
            connection.retry_multiplier = v;
        }

        if let Some(v) = self.enable_snapshot {
            options.store.enable_snapshot = v;
        }
        if let Some(v) = self.max_snapshots {
            options.store.max_snapshots = v;
        }

        let strict = self.strict.unwrap_or(false);
        options.initial_handler.strict = strict;
        options.update_handler.strict = strict;
        options
    }
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                log::warn!("Failed to parse config file: {} ({}). Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file: {} ({}). Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers defaults, the config file and the parsed CLI/env arguments.
pub fn load_config_from(cli: Config) -> Config {
    let mut current_config = Config::defaults();

    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.layer(file_config);
    }

    current_config.layer(cli)
}

pub fn load_config() -> Config {
    load_config_from(Config::parse())
}
