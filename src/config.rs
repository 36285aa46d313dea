//! Configuration management for lotcrawl using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrapers::{FetchConfig, ProxyPoolConfig};
use crate::services::DetailStrategy;
use crate::storage::dated_filename;

/// Default listing site.
pub const DEFAULT_BASE_URL: &str = "https://www.bidadoo.com/results";

/// Default public proxy lists.
pub const DEFAULT_PROXY_SOURCES: [&str; 2] =
    ["https://free-proxy-list.net/", "https://sslproxies.org/"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Which pipeline a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Paginate the listing site and read each lot's embedded data.
    Crawl,
    /// Re-process a previously exported table through the proxy pool.
    Reclean,
}

impl CrawlMode {
    pub fn default_workers(self) -> usize {
        match self {
            Self::Crawl => 10,
            Self::Reclean => 100,
        }
    }

    pub fn default_use_proxies(self) -> bool {
        matches!(self, Self::Reclean)
    }

    pub fn strategy(self) -> DetailStrategy {
        match self {
            Self::Crawl => DetailStrategy::EmbeddedJson,
            Self::Reclean => DetailStrategy::IframeListGroup,
        }
    }

    pub fn snapshot_prefix(self) -> &'static str {
        match self {
            Self::Crawl => "results",
            Self::Reclean => "cleaned_data",
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listing URL paginated by `crawl`.
    pub base_url: String,
    /// Search keyword sent with pages after the first.
    pub keyword: String,
    /// Worker count; `None` uses the mode default.
    pub workers: Option<usize>,
    /// Items the work queue holds before producers wait.
    pub queue_capacity: usize,
    /// Per-attempt request timeout in seconds.
    pub request_timeout: u64,
    /// Attempts for a listing page before giving up.
    pub listing_attempts: u32,
    /// Attempts for a detail page; `None` retries until it resolves.
    pub detail_attempts: Option<u32>,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Route requests through the proxy pool; `None` uses the mode default.
    pub use_proxies: Option<bool>,
    /// Proxy list pages scraped on every refresh.
    pub proxy_sources: Vec<String>,
    /// Rows read from each proxy list.
    pub proxy_rows: usize,
    /// Fixed proxies added alongside the scraped ones.
    pub static_proxies: Vec<String>,
    /// Seconds between proxy refreshes.
    pub proxy_refresh_secs: u64,
    /// Bans never shrink the live proxy set below this size.
    pub proxy_floor: usize,
    /// Failures through a proxy before it is banned.
    pub proxy_failure_threshold: u32,
    /// Persist a snapshot after this many completed items (0 disables).
    pub snapshot_every: usize,
    /// Directory for snapshots and the rejected-item file.
    pub output_dir: PathBuf,
    /// Rejected-item file; relative paths live under `output_dir`.
    pub rejected_file: PathBuf,
    /// Optional log file in addition to stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            keyword: String::new(),
            workers: None,
            queue_capacity: crate::work_queue::DEFAULT_CAPACITY,
            request_timeout: 10,
            listing_attempts: 10,
            detail_attempts: None,
            retry_delay_ms: 100,
            use_proxies: None,
            proxy_sources: DEFAULT_PROXY_SOURCES.iter().map(|s| s.to_string()).collect(),
            proxy_rows: 299,
            static_proxies: Vec::new(),
            proxy_refresh_secs: 10,
            proxy_floor: 20,
            proxy_failure_threshold: 1,
            snapshot_every: 10,
            output_dir: PathBuf::from("./data"),
            rejected_file: PathBuf::from("rejected.json"),
            log_file: None,
        }
    }
}

impl Settings {
    pub fn workers_for(&self, mode: CrawlMode) -> usize {
        self.workers.unwrap_or_else(|| mode.default_workers())
    }

    pub fn use_proxies_for(&self, mode: CrawlMode) -> bool {
        self.use_proxies
            .unwrap_or_else(|| mode.default_use_proxies())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            listing_attempts: self.listing_attempts,
            detail_attempts: self.detail_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn proxy_pool_config(&self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            floor: self.proxy_floor,
            failure_threshold: self.proxy_failure_threshold.max(1),
        }
    }

    pub fn proxy_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.proxy_refresh_secs.max(1))
    }

    pub fn rejected_path(&self) -> PathBuf {
        if self.rejected_file.is_absolute() {
            self.rejected_file.clone()
        } else {
            self.output_dir.join(&self.rejected_file)
        }
    }

    pub fn snapshot_filename(&self, mode: CrawlMode, date: NaiveDate) -> String {
        dated_filename(mode.snapshot_prefix(), date)
    }

    /// Reject settings no run could work with.
    pub fn validate(&self, mode: CrawlMode) -> Result<(), ConfigError> {
        if self.workers_for(mode) == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.listing_attempts == 0 {
            return Err(ConfigError::Invalid(
                "listing_attempts must be at least 1".into(),
            ));
        }
        if self.detail_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "detail_attempts must be at least 1 (omit it to retry forever)".into(),
            ));
        }
        if mode == CrawlMode::Crawl {
            url::Url::parse(&self.base_url).map_err(|e| {
                ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e))
            })?;
        }
        if self.use_proxies_for(mode)
            && self.proxy_sources.is_empty()
            && self.static_proxies.is_empty()
        {
            return Err(ConfigError::Invalid(
                "proxies enabled but no proxy_sources or static_proxies configured".into(),
            ));
        }
        Ok(())
    }

    /// Apply `LOTCRAWL_*` overrides read through `var`.
    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|s| !s.trim().is_empty());

        if let Some(dir) = var("LOTCRAWL_OUTPUT_DIR") {
            tracing::debug!("Using LOTCRAWL_OUTPUT_DIR from environment: {}", dir);
            self.output_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Some(workers) = var("LOTCRAWL_WORKERS") {
            match workers.trim().parse() {
                Ok(n) => self.workers = Some(n),
                Err(_) => tracing::warn!("Ignoring invalid LOTCRAWL_WORKERS={}", workers),
            }
        }
        if let Some(sources) = var("LOTCRAWL_PROXY_SOURCES") {
            self.proxy_sources = sources
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_attempts: Option<u32>,
    /// Delay between attempts in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_proxies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_proxies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_refresh_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_floor: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_every: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "data_dir")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no lotcrawl config file is found.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load("lotcrawl").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_err("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_err("JSON", e.to_string())),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref keyword) = self.keyword {
            settings.keyword = keyword.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = Some(workers);
        }
        if let Some(capacity) = self.queue_capacity {
            settings.queue_capacity = capacity;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(attempts) = self.listing_attempts {
            settings.listing_attempts = attempts;
        }
        if let Some(attempts) = self.detail_attempts {
            settings.detail_attempts = Some(attempts);
        }
        if let Some(delay) = self.retry_delay_ms {
            settings.retry_delay_ms = delay;
        }
        if let Some(use_proxies) = self.use_proxies {
            settings.use_proxies = Some(use_proxies);
        }
        if let Some(ref sources) = self.proxy_sources {
            settings.proxy_sources = sources.clone();
        }
        if let Some(rows) = self.proxy_rows {
            settings.proxy_rows = rows;
        }
        if !self.static_proxies.is_empty() {
            settings.static_proxies = self.static_proxies.clone();
        }
        if let Some(secs) = self.proxy_refresh_secs {
            settings.proxy_refresh_secs = secs;
        }
        if let Some(floor) = self.proxy_floor {
            settings.proxy_floor = floor;
        }
        if let Some(threshold) = self.proxy_failure_threshold {
            settings.proxy_failure_threshold = threshold;
        }
        if let Some(every) = self.snapshot_every {
            settings.snapshot_every = every;
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref file) = self.rejected_file {
            settings.rejected_file = PathBuf::from(shellexpand::tilde(file).as_ref());
        }
        if let Some(ref file) = self.log_file {
            settings.log_file = Some(self.resolve_path(file, base_dir));
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match &options.config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let mut settings = Settings::default();

    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd()
    } else {
        config.base_dir().unwrap_or_else(cwd)
    };

    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env_overrides(|key| std::env::var(key).ok());

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_mode_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.workers_for(CrawlMode::Crawl), 10);
        assert_eq!(settings.workers_for(CrawlMode::Reclean), 100);
        assert!(!settings.use_proxies_for(CrawlMode::Crawl));
        assert!(settings.use_proxies_for(CrawlMode::Reclean));
        assert_eq!(settings.fetch_config().listing_attempts, 10);
        assert_eq!(settings.fetch_config().detail_attempts, None);
        assert_eq!(settings.proxy_pool_config().floor, 20);
    }

    #[test]
    fn test_snapshot_filename() {
        let settings = Settings::default();
        let date = NaiveDate::from_ymd_opt(2023, 9, 10).unwrap();
        assert_eq!(
            settings.snapshot_filename(CrawlMode::Reclean, date),
            "cleaned_data_2023-09-10.csv"
        );
        assert_eq!(
            settings.snapshot_filename(CrawlMode::Crawl, date),
            "results_2023-09-10.csv"
        );
    }

    #[tokio::test]
    async fn test_load_toml_and_apply() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotcrawl.toml");
        std::fs::write(
            &path,
            r#"
keyword = "excavator"
workers = 25
detail_attempts = 40
output_dir = "out"
static_proxies = ["10.0.0.1:3128"]
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());

        assert_eq!(settings.keyword, "excavator");
        assert_eq!(settings.workers_for(CrawlMode::Reclean), 25);
        assert_eq!(settings.detail_attempts, Some(40));
        assert_eq!(settings.output_dir, dir.path().join("out"));
        assert_eq!(settings.static_proxies, vec!["10.0.0.1:3128".to_string()]);
        assert_eq!(settings.rejected_path(), dir.path().join("out").join("rejected.json"));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("lotcrawl.yaml");
        std::fs::write(&yaml, "use_proxies: true\nproxy_floor: 5\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.use_proxies, Some(true));
        assert_eq!(config.proxy_floor, Some(5));

        let json = dir.path().join("lotcrawl.json");
        std::fs::write(&json, r#"{"snapshot_every": 3}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.snapshot_every, Some(3));
    }

    #[tokio::test]
    async fn test_parse_error_names_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "workers = [").unwrap();
        match Config::load_from_path(&path).await {
            Err(ConfigError::Parse { format, .. }) => assert_eq!(format, "TOML"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match Config::load_from_path(&path).await {
            Err(ConfigError::Read { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOTCRAWL_WORKERS", "42"),
            ("LOTCRAWL_PROXY_SOURCES", "https://a.example/, ,https://b.example/"),
            ("LOTCRAWL_OUTPUT_DIR", "/tmp/lots"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.workers, Some(42));
        assert_eq!(
            settings.proxy_sources,
            vec!["https://a.example/".to_string(), "https://b.example/".to_string()]
        );
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/lots"));
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        assert!(settings.validate(CrawlMode::Crawl).is_ok());

        settings.workers = Some(0);
        assert!(settings.validate(CrawlMode::Crawl).is_err());

        let mut settings = Settings {
            proxy_sources: Vec::new(),
            ..Default::default()
        };
        assert!(settings.validate(CrawlMode::Crawl).is_ok());
        assert!(settings.validate(CrawlMode::Reclean).is_err());
        settings.static_proxies = vec!["1.2.3.4:80".into()];
        assert!(settings.validate(CrawlMode::Reclean).is_ok());

        let settings = Settings {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(settings.validate(CrawlMode::Crawl).is_err());
    }
}
