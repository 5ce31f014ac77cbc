//! Generative Media Task Gateway
//!
//! Coordinates long-running, rate-limited calls to an external generative
//! media provider for a multi-client web UI: an in-memory task queue drained
//! by per-class worker pools, a versioned artifact store per project, and a
//! resumable SSE event stream over task state transitions.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod queue;
pub mod resource;
pub mod version;

pub use error::{AppError, Result};

use std::sync::Arc;

use config::Settings;
use events::EventBroadcaster;
use queue::task_queue::TaskQueue;
use version::VersionStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: Arc<TaskQueue>,
    pub versions: Arc<VersionStore>,
    pub broadcaster: Arc<EventBroadcaster>,
}
