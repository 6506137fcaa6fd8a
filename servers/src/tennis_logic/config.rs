use clap::Parser;
use lib_common::configs::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "server_tennis.conf";
const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Tennis live data server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TENNIS_PORT", help = "Port to listen on for HTTP and WebSocket clients.")]
    pub port: Option<u16>,

    #[clap(long, env = "TENNIS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TENNIS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TENNIS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TENNIS_BOT_API", help = "Primary upstream URL of the tennis feed.")]
    pub bot_api: Option<String>,

    #[clap(
        long,
        env = "TENNIS_FALLBACK_URLS",
        value_delimiter = ',',
        help = "Comma separated fallback feed URLs, tried in order at startup."
    )]
    pub fallback_urls: Option<Vec<String>>,

    #[clap(long, env = "TENNIS_CACHE_TTL_SECONDS", help = "Seconds a match stays in the snapshot cache after its last update.")]
    pub cache_ttl_seconds: Option<u64>,

    #[clap(long, env = "TENNIS_CYCLE_SECONDS", help = "Target length in seconds of one poll cycle.")]
    pub cycle_seconds: Option<u64>,

    #[clap(long, env = "TENNIS_HEARTBEAT_SECONDS", help = "Seconds after which unchanged data is re-sent to a WebSocket client.")]
    pub heartbeat_seconds: Option<u64>,

    #[clap(long, env = "TENNIS_FAILURE_BACKOFF_SECONDS", help = "Seconds to wait after a failed poll.")]
    pub failure_backoff_seconds: Option<u64>,

    #[clap(long, env = "TENNIS_FETCH_TIMEOUT_SECONDS", help = "Timeout in seconds for one upstream request.")]
    pub fetch_timeout_seconds: Option<u64>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            bot_api: other.bot_api.or(self.bot_api),
            fallback_urls: other.fallback_urls.or(self.fallback_urls),
            cache_ttl_seconds: other.cache_ttl_seconds.or(self.cache_ttl_seconds),
            cycle_seconds: other.cycle_seconds.or(self.cycle_seconds),
            heartbeat_seconds: other.heartbeat_seconds.or(self.heartbeat_seconds),
            failure_backoff_seconds: other.failure_backoff_seconds.or(self.failure_backoff_seconds),
            fetch_timeout_seconds: other.fetch_timeout_seconds.or(self.fetch_timeout_seconds),
        }
    }

    fn defaults() -> Config {
        let pipeline = PipelineConfig::default();
        Config {
            port: Some(DEFAULT_PORT),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            bot_api: Some(pipeline.primary_url),
            fallback_urls: Some(pipeline.fallback_urls),
            cache_ttl_seconds: Some(pipeline.cache_ttl_secs),
            cycle_seconds: Some(pipeline.cycle_target_secs),
            heartbeat_seconds: Some(pipeline.heartbeat_secs),
            failure_backoff_seconds: Some(pipeline.failure_backoff_secs),
            fetch_timeout_seconds: Some(pipeline.fetch_timeout_secs),
            ..Default::default()
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    /// The options of the poll loop, cache and dispatcher.
    pub fn pipeline(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            primary_url: self.bot_api.clone().unwrap_or(defaults.primary_url),
            fallback_urls: self.fallback_urls.clone().unwrap_or(defaults.fallback_urls),
            cache_ttl_secs: self.cache_ttl_seconds.unwrap_or(defaults.cache_ttl_secs),
            cycle_target_secs: self.cycle_seconds.unwrap_or(defaults.cycle_target_secs),
            heartbeat_secs: self.heartbeat_seconds.unwrap_or(defaults.heartbeat_secs),
            failure_backoff_secs: self
                .failure_backoff_seconds
                .unwrap_or(defaults.failure_backoff_secs),
            fetch_timeout_secs: self.fetch_timeout_seconds.unwrap_or(defaults.fetch_timeout_secs),
            ..defaults
        }
    }
}

pub fn load_config() -> Config {
    // Environment variables and CLI arguments, as parsed by clap.
    resolve(Config::parse())
}

/// Layers built-in defaults, then the config file, then `cli`.
fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }

    current_config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            path.display()
        );
        return None;
    }

    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Config>(&config_str) {
        Ok(file_config) => Some(file_config),
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let cli = Config {
            config_path: Some(PathBuf::from("/nonexistent/server_tennis.conf")),
            ..Default::default()
        };

        let config = resolve(cli);

        assert_eq!(config.port(), 8080);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.pipeline(), PipelineConfig::default());
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let file = write_config(
            r#"{"port": 9100, "botApi": "http://file/api/tennis", "heartbeatSeconds": 3}"#,
        );
        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            port: Some(9200),
            ..Default::default()
        };

        let config = resolve(cli);
        let pipeline = config.pipeline();

        assert_eq!(config.port(), 9200);
        assert_eq!(pipeline.primary_url, "http://file/api/tennis");
        assert_eq!(pipeline.heartbeat(), Duration::from_secs(3));
        assert_eq!(pipeline.cycle_target(), Duration::from_secs(10));
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let file = write_config("not json");
        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        assert_eq!(resolve(cli).port(), 8080);
    }

    #[test]
    fn flags_parse_into_pipeline_options() {
        let cli = Config::try_parse_from([
            "server_tennis",
            "--bot-api",
            "http://primary/api/tennis",
            "--fallback-urls",
            "http://b1/api/tennis,http://b2/api/tennis",
            "--cache-ttl-seconds",
            "120",
        ])
        .unwrap();

        let pipeline = cli.pipeline();

        assert_eq!(
            pipeline.source_urls(),
            vec!["http://primary/api/tennis", "http://b1/api/tennis", "http://b2/api/tennis"]
        );
        assert_eq!(pipeline.cache_ttl(), Duration::from_secs(120));
    }
}
