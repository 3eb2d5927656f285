//! Global client configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

/// Represents the complete client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub api_url: String,
    pub token_file: String,
    pub request_timeout_secs: u64,
    pub qr_refresh_ms: u64,
    pub refresh_backoff_after: u32,
    pub refresh_max_backoff_secs: u64,
    pub scan_interval_ms: u64,
    pub scanner_start_delay_ms: u64,
    pub capture_width: u32,
    pub capture_height: u32,
    pub notice_ttl_secs: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Reads `key` and parses it, falling back to `default` when missing or malformed.
fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every value has a default; numeric values that fail to parse use it too.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "attend".into()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "attend=info,presence=info,client=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "attend.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:5000/api".into()),
            token_file: env::var("TOKEN_FILE").unwrap_or_else(|_| ".attend/token".into()),
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 10),
            qr_refresh_ms: parsed("QR_REFRESH_MS", 5_000),
            refresh_backoff_after: parsed("REFRESH_BACKOFF_AFTER", 3),
            refresh_max_backoff_secs: parsed("REFRESH_MAX_BACKOFF_SECS", 60),
            scan_interval_ms: parsed("SCAN_INTERVAL_MS", 300),
            scanner_start_delay_ms: parsed("SCANNER_START_DELAY_MS", 0),
            capture_width: parsed("CAPTURE_WIDTH", 1280),
            capture_height: parsed("CAPTURE_HEIGHT", 720),
            notice_ttl_secs: parsed("NOTICE_TTL_SECS", 5),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            if let Ok(mut guard) = lock.write() {
                *guard = AppConfig::from_env();
            }
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    pub fn qr_refresh_period(&self) -> Duration {
        Duration::from_millis(self.qr_refresh_ms.max(1))
    }

    pub fn refresh_max_backoff(&self) -> Duration {
        Duration::from_secs(self.refresh_max_backoff_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn scanner_start_delay(&self) -> Duration {
        Duration::from_millis(self.scanner_start_delay_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_secs)
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_api_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.api_url = value.into());
    }

    pub fn set_token_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.token_file = value.into());
    }

    pub fn set_qr_refresh_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.qr_refresh_ms = value);
    }

    pub fn set_scan_interval_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.scan_interval_ms = value);
    }

    pub fn set_notice_ttl_secs(value: u64) {
        AppConfig::set_field(|cfg| cfg.notice_ttl_secs = value);
    }
}
