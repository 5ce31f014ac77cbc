//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per project.
    #[serde(default = "default_projects_root")]
    pub projects_root: String,
}

fn default_projects_root() -> String {
    "./projects".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            projects_root: default_projects_root(),
        }
    }
}

/// Provider (generation API) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Provider API key; usually injected via environment.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    /// Client-side timeout for a single provider call. Video synthesis can
    /// take minutes, so this is deliberately generous.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_image_attempts")]
    pub image_max_attempts: u32,
    #[serde(default = "default_video_attempts")]
    pub video_max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_image_model() -> String {
    "img-gen-pro".to_string()
}

fn default_video_model() -> String {
    "video-gen-1".to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_image_attempts() -> u32 {
    5
}

fn default_video_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2
}

fn default_backoff_max() -> u64 {
    32
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            image_model: default_image_model(),
            video_model: default_video_model(),
            request_timeout_secs: default_request_timeout(),
            image_max_attempts: default_image_attempts(),
            video_max_attempts: default_video_attempts(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

/// Per-class provider rate limit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassLimitConfig {
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_min_gap_ms")]
    pub min_gap_ms: u64,
}

fn default_rpm() -> u32 {
    15
}

fn default_min_gap_ms() -> u64 {
    3100
}

impl Default for ClassLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            min_gap_ms: default_min_gap_ms(),
        }
    }
}

/// Rate limiting configuration, one limit per media class
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub image: ClassLimitConfig,
    #[serde(default)]
    pub video: ClassLimitConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_image_workers")]
    pub image_workers: usize,
    #[serde(default = "default_video_workers")]
    pub video_workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_image_workers() -> usize {
    3
}

fn default_video_workers() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            image_workers: default_image_workers(),
            video_workers: default_video_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Event stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Number of recent events retained for stream resumption.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Maximum number of tasks included in a stream snapshot.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
}

fn default_ring_capacity() -> usize {
    1024
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_snapshot_limit() -> usize {
    1000
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            heartbeat_secs: default_heartbeat_secs(),
            snapshot_limit: default_snapshot_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with MEDIA_GATEWAY__)
            .add_source(
                Environment::with_prefix("MEDIA_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }
        if self.workers.image_workers == 0 || self.workers.video_workers == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Worker pools must have at least one worker".to_string(),
            )));
        }
        for (class, limit) in [
            ("image", &self.rate_limit.image),
            ("video", &self.rate_limit.video),
        ] {
            if limit.requests_per_minute == 0 {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "rate_limit.{}.requests_per_minute must be at least 1",
                    class
                ))));
            }
        }
        if self.generation.image_max_attempts == 0 || self.generation.video_max_attempts == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "generation max attempts must be at least 1".to_string(),
            )));
        }
        if self.events.ring_capacity == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "events.ring_capacity must be at least 1".to_string(),
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            generation: GenerationConfig::default(),
            rate_limit: RateLimitConfig::default(),
            workers: WorkerConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.workers.image_workers, 3);
        assert_eq!(settings.workers.video_workers, 2);
        assert_eq!(settings.rate_limit.image.requests_per_minute, 15);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut settings = Settings::default();
        settings.workers.image_workers = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rpm() {
        let mut settings = Settings::default();
        settings.rate_limit.video.requests_per_minute = 0;
        assert!(settings.validate().is_err());
    }
}
