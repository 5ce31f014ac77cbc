//! Worker pool draining the task queue
//!
//! A fixed number of workers per media class poll the queue, run the
//! generation pipeline for each claimed task and drive it to a terminal
//! state. Any pipeline error marks the task failed; nothing a worker hits
//! short of a panic leaves a task running.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::retry::{call_with_retry, RetryPolicy};
use crate::client::traits::{
    normalize_duration_seconds, GenerationBackend, ImageRequest, VideoRequest,
};
use crate::config::Settings;
use crate::limiter::RateLimiter;
use crate::queue::task::Task;
use crate::queue::task_queue::TaskQueue;
use crate::resource::MediaClass;
use crate::version::VersionStore;

const DEFAULT_ASPECT_RATIO: &str = "16:9";
const DEFAULT_RESOLUTION: &str = "720p";

/// Everything a worker needs, shared across the pool.
pub struct WorkerContext {
    pub queue: Arc<TaskQueue>,
    pub versions: Arc<VersionStore>,
    pub backend: Arc<dyn GenerationBackend>,
    pub limiter: Arc<RateLimiter>,
    pub image_policy: RetryPolicy,
    pub video_policy: RetryPolicy,
    pub poll_interval: Duration,
}

impl WorkerContext {
    fn policy(&self, class: MediaClass) -> &RetryPolicy {
        match class {
            MediaClass::Image => &self.image_policy,
            MediaClass::Video => &self.video_policy,
        }
    }
}

/// Handle to the running pool; dropping it does not stop the workers.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the configured number of image and video workers.
    pub fn start(settings: &Settings, context: Arc<WorkerContext>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        for n in 0..settings.workers.image_workers {
            handles.push(Self::spawn_worker(
                format!("image-{}", n),
                MediaClass::Image,
                context.clone(),
                shutdown.subscribe(),
            ));
        }
        for n in 0..settings.workers.video_workers {
            handles.push(Self::spawn_worker(
                format!("video-{}", n),
                MediaClass::Video,
                context.clone(),
                shutdown.subscribe(),
            ));
        }

        info!(
            image_workers = settings.workers.image_workers,
            video_workers = settings.workers.video_workers,
            "worker pool started"
        );
        Self { shutdown, handles }
    }

    fn spawn_worker(
        worker_id: String,
        class: MediaClass,
        context: Arc<WorkerContext>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            worker_loop(worker_id, class, context, shutdown).await;
        })
    }

    /// Signal all workers and wait for in-flight tasks to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: String,
    class: MediaClass,
    context: Arc<WorkerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        match context.queue.claim(class) {
            Some(task) => {
                info!(
                    worker = %worker_id,
                    task_id = %task.id,
                    task_type = %task.task_type,
                    resource_id = %task.resource_id,
                    "task claimed"
                );
                process_task(&context, task).await;
            }
            None => {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(context.poll_interval) => {}
                }
            }
        }
    }
}

/// Run one task to a terminal state.
async fn process_task(context: &WorkerContext, task: Task) {
    let class = task.media_class();
    let outcome = match class {
        MediaClass::Image => run_image_task(context, &task).await,
        MediaClass::Video => run_video_task(context, &task).await,
    };

    let transition = match outcome {
        Ok((version, file, retry_count)) => {
            context.queue.complete(&task.id, version, file, retry_count)
        }
        Err((message, retry_count)) => {
            warn!(task_id = %task.id, retry_count, error = %message, "task failed");
            context.queue.fail(&task.id, &message, retry_count)
        }
    };
    if let Err(e) = transition {
        error!(task_id = %task.id, error = %e, "could not record task outcome");
    }
}

type PipelineOutcome = std::result::Result<(u64, String, u32), (String, u32)>;

async fn run_image_task(context: &WorkerContext, task: &Task) -> PipelineOutcome {
    let project_path = context.versions.project_path(&task.project);

    let mut reference_images = Vec::new();
    for rel in &task.payload.reference_images {
        let path = project_path.join(rel);
        if file_exists(&path).await {
            reference_images.push(path);
        } else {
            // Missing references degrade consistency but should not sink the
            // whole generation.
            warn!(task_id = %task.id, reference = %rel, "reference image missing, skipping");
        }
    }

    let request = ImageRequest {
        prompt: task.payload.prompt.clone(),
        reference_images,
        aspect_ratio: task
            .payload
            .aspect_ratio
            .clone()
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
        image_size: task.payload.image_size.clone(),
    };

    let result = call_with_retry(
        context.policy(MediaClass::Image),
        &context.limiter,
        MediaClass::Image,
        || async { context.backend.generate_image(&request).await },
    )
    .await;

    match result {
        Ok(outcome) => store_artifact(context, task, outcome.bytes, outcome.retry_count).await,
        Err(failure) => Err((failure.message, failure.retry_count)),
    }
}

async fn run_video_task(context: &WorkerContext, task: &Task) -> PipelineOutcome {
    // Video synthesis animates the scene's storyboard frame; without it
    // there is nothing to animate.
    let start_image = context.versions.current_path(
        &task.project,
        crate::resource::ResourceKind::Storyboards,
        &task.resource_id,
    );
    if !file_exists(&start_image).await {
        return Err((
            format!(
                "storyboard frame not found for scene {}: generate the storyboard first",
                task.resource_id
            ),
            0,
        ));
    }

    let request = VideoRequest {
        prompt: task.payload.prompt.clone(),
        start_image: Some(start_image),
        duration_seconds: normalize_duration_seconds(task.payload.duration_seconds),
        aspect_ratio: task
            .payload
            .aspect_ratio
            .clone()
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
        resolution: task
            .payload
            .resolution
            .clone()
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string()),
        negative_prompt: task.payload.negative_prompt.clone(),
    };

    let result = call_with_retry(
        context.policy(MediaClass::Video),
        &context.limiter,
        MediaClass::Video,
        || async { context.backend.generate_video(&request).await },
    )
    .await;

    match result {
        Ok(outcome) => store_artifact(context, task, outcome.bytes, outcome.retry_count).await,
        Err(failure) => Err((failure.message, failure.retry_count)),
    }
}

/// Persist generated bytes as a new version of the task's resource.
async fn store_artifact(
    context: &WorkerContext,
    task: &Task,
    bytes: Vec<u8>,
    retry_count: u32,
) -> PipelineOutcome {
    let mut metadata = serde_json::Map::new();
    if let Some(aspect_ratio) = &task.payload.aspect_ratio {
        metadata.insert("aspect_ratio".to_string(), serde_json::json!(aspect_ratio));
    }
    if let Some(duration) = task.payload.duration_seconds {
        metadata.insert("duration_seconds".to_string(), serde_json::json!(duration));
    }
    if let Some(resolution) = &task.payload.resolution {
        metadata.insert("resolution".to_string(), serde_json::json!(resolution));
    }
    metadata.insert("source".to_string(), serde_json::json!(task.source));

    match context
        .versions
        .add_version(
            &task.project,
            task.resource_kind(),
            &task.resource_id,
            &bytes,
            &task.payload.prompt,
            metadata,
        )
        .await
    {
        Ok(added) => Ok((added.version, added.file, retry_count)),
        Err(e) => Err((format!("failed to store artifact: {}", e), retry_count)),
    }
}

async fn file_exists(path: &PathBuf) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Build the worker context from settings and the shared services.
pub fn build_context(
    settings: &Settings,
    queue: Arc<TaskQueue>,
    versions: Arc<VersionStore>,
    backend: Arc<dyn GenerationBackend>,
    limiter: Arc<RateLimiter>,
) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        queue,
        versions,
        backend,
        limiter,
        image_policy: RetryPolicy::from_config(&settings.generation, MediaClass::Image),
        video_policy: RetryPolicy::from_config(&settings.generation, MediaClass::Video),
        poll_interval: Duration::from_millis(settings.workers.poll_interval_ms),
    })
}
