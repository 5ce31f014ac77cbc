//! Configuration management

pub mod settings;

pub use settings::{
    ClassLimitConfig, EventsConfig, GenerationConfig, LoggingConfig, RateLimitConfig,
    ServerConfig, Settings, StorageConfig, WorkerConfig,
};
