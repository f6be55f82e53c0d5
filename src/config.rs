//! Application configuration loaded from environment variables.
//!
//! Scan budgets default to values sized for a 5000 requests/hour GitHub
//! quota and a 15 minute trigger period.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Queue name that Cloud Tasks sends in `x-cloudtasks-queuename`.
pub const DEFAULT_TASKS_QUEUE_NAME: &str = "scan-triggers";

/// Token owner whose stored access token is used when `GITHUB_TOKEN` is unset.
pub const DEFAULT_TOKEN_USER_ID: u64 = 3138447;

/// Logins never refreshed individually: too many repositories, or GitHub
/// answers 502 for them.
pub const DEFAULT_SKIP_LOGINS: &[&str] = &[
    "GITenberg",
    "gitpan",
    "the-domains",
    "wp-plugins",
    "gitter-badger",
    "Try-Git",
];

/// Which store implementation backs the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store, for local runs without Firestore.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port for trigger intake
    pub port: u16,
    /// Store implementation
    pub store_backend: StoreBackend,
    /// GitHub token; looked up by `github_token_user_id` when absent
    pub github_token: Option<String>,
    /// User whose access token selects the quota bucket
    pub github_token_user_id: u64,
    /// GitHub API base URL
    pub github_api_url: String,
    /// Required `x-cloudtasks-queuename` header value
    pub tasks_queue_name: String,
    /// Optional bearer secret for `/tasks/*`
    pub tasks_shared_secret: Option<String>,
    /// Scan tuning
    pub scan: ScanConfig,
}

/// Budgets and thresholds shared by both scans.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Days after a refresh before a user is refreshed again
    pub update_threshold_days: i64,
    /// Stop a session when fewer API calls than this remain
    pub min_rate_limit_remaining: u64,
    /// Pages fetched per full-scan session
    pub full_scan_max_batches: u32,
    /// Users refreshed per star-scan session
    pub star_scan_max_updates: u32,
    /// Users inspected (including skips) per star-scan session
    pub star_scan_max_checks: u32,
    /// Users per star-scan page
    pub star_scan_batch_size: u32,
    /// Pause after each refresh. 1000 users * 0.5s = 8.3 min of a 15 min period.
    pub user_update_delay: Duration,
    /// How often a waiting worker re-checks for shutdown
    pub trigger_poll_interval: Duration,
    /// Logins excluded from refresh
    pub skip_logins: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            update_threshold_days: 1,
            min_rate_limit_remaining: 500,
            full_scan_max_batches: 10,
            star_scan_max_updates: 1000,
            star_scan_max_checks: 2000,
            star_scan_batch_size: 100,
            user_update_delay: Duration::from_millis(500),
            trigger_poll_interval: Duration::from_secs(5),
            skip_logins: DEFAULT_SKIP_LOGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            github_token: Some("test_token".to_string()),
            github_token_user_id: DEFAULT_TOKEN_USER_ID,
            github_api_url: "http://localhost:9999".to_string(),
            tasks_queue_name: DEFAULT_TASKS_QUEUE_NAME.to_string(),
            tasks_shared_secret: None,
            scan: ScanConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend: match env::var("STORE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => StoreBackend::Firestore,
            },
            github_token: non_empty_var("GITHUB_TOKEN"),
            github_token_user_id: parse_var("GITHUB_TOKEN_USER_ID", DEFAULT_TOKEN_USER_ID)?,
            github_api_url: env::var("GITHUB_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            tasks_queue_name: env::var("TASKS_QUEUE_NAME")
                .unwrap_or_else(|_| DEFAULT_TASKS_QUEUE_NAME.to_string()),
            tasks_shared_secret: non_empty_var("TASKS_SHARED_SECRET"),
            scan: ScanConfig::from_env()?,
        })
    }
}

impl ScanConfig {
    /// Load scan tuning, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let skip_logins = match env::var("SKIP_LOGINS") {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.skip_logins,
        };

        let scan = Self {
            update_threshold_days: parse_var(
                "UPDATE_THRESHOLD_DAYS",
                defaults.update_threshold_days,
            )?,
            min_rate_limit_remaining: parse_var(
                "MIN_RATE_LIMIT_REMAINING",
                defaults.min_rate_limit_remaining,
            )?,
            full_scan_max_batches: parse_var(
                "FULL_SCAN_MAX_BATCHES",
                defaults.full_scan_max_batches,
            )?,
            star_scan_max_updates: parse_var(
                "STAR_SCAN_MAX_UPDATES",
                defaults.star_scan_max_updates,
            )?,
            star_scan_max_checks: parse_var("STAR_SCAN_MAX_CHECKS", defaults.star_scan_max_checks)?,
            star_scan_batch_size: parse_var("STAR_SCAN_BATCH_SIZE", defaults.star_scan_batch_size)?,
            user_update_delay: Duration::from_millis(parse_var(
                "USER_UPDATE_DELAY_MS",
                defaults.user_update_delay.as_millis() as u64,
            )?),
            trigger_poll_interval: Duration::from_secs(parse_var(
                "TRIGGER_POLL_SECS",
                defaults.trigger_poll_interval.as_secs(),
            )?),
            skip_logins,
        };
        scan.validate()?;
        Ok(scan)
    }

    /// Reject budgets that would let a session run without doing any work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("FULL_SCAN_MAX_BATCHES", self.full_scan_max_batches),
            ("STAR_SCAN_MAX_UPDATES", self.star_scan_max_updates),
            ("STAR_SCAN_MAX_CHECKS", self.star_scan_max_checks),
            ("STAR_SCAN_BATCH_SIZE", self.star_scan_batch_size),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid(name));
            }
        }
        if self.trigger_poll_interval.is_zero() {
            return Err(ConfigError::Invalid("TRIGGER_POLL_SECS"));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
