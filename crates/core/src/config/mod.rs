//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STOWAGE_*)
//! 2. TOML config file (if STOWAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STOWAGE_*)
/// 2. TOML config file (if STOWAGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache generation label for the current build.
    ///
    /// Free-form, but must change whenever deployed artifact content
    /// changes so stale-generation eviction triggers correctly.
    #[serde(default = "default_build_label")]
    pub build_label: String,

    /// The agent's own origin. Cross-origin requests are never intercepted.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Ordered list of essential resource paths seeded at install time.
    #[serde(default = "default_shell_manifest")]
    pub shell_manifest: Vec<String>,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Update-check endpoint path, resolved against the origin.
    #[serde(default = "default_update_endpoint")]
    pub update_endpoint: String,

    /// Endpoint path that receives deferred-sync uploads.
    #[serde(default = "default_sync_endpoint")]
    pub sync_endpoint: String,

    /// Tag identifying deferred-sync triggers; other tags are ignored.
    #[serde(default = "default_deferred_sync_tag")]
    pub deferred_sync_tag: String,

    /// Tag identifying scheduled-sync triggers; other tags are ignored.
    #[serde(default = "default_scheduled_sync_tag")]
    pub scheduled_sync_tag: String,

    /// Title used for every notification the agent emits.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Icon resource path for notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Badge resource path for notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_badge: String,

    /// Vibration pattern for push notifications.
    #[serde(default = "default_vibration")]
    pub vibration: Vec<u32>,
}

fn default_build_label() -> String {
    "app-shell-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_shell_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stowage-cache.sqlite")
}

fn default_user_agent() -> String {
    "stowage/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_update_endpoint() -> String {
    "/api/check-updates".into()
}

fn default_sync_endpoint() -> String {
    "/api/sync".into()
}

fn default_deferred_sync_tag() -> String {
    "deferred-sync".into()
}

fn default_scheduled_sync_tag() -> String {
    "scheduled-sync".into()
}

fn default_app_title() -> String {
    "Stowage".into()
}

fn default_notification_icon() -> String {
    "/assets/icon-192.png".into()
}

fn default_vibration() -> Vec<u32> {
    vec![100, 50, 100]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            build_label: default_build_label(),
            origin: default_origin(),
            shell_manifest: default_shell_manifest(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            update_endpoint: default_update_endpoint(),
            sync_endpoint: default_sync_endpoint(),
            deferred_sync_tag: default_deferred_sync_tag(),
            scheduled_sync_tag: default_scheduled_sync_tag(),
            app_title: default_app_title(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_icon(),
            vibration: default_vibration(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STOWAGE_`
    /// 2. TOML file from `STOWAGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STOWAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STOWAGE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
