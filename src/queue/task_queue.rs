//! In-memory task queue
//!
//! Single source of truth for task state. One FIFO lane per media class
//! feeds the workers; an index over non-terminal tasks deduplicates repeat
//! submissions for the same resource. Every state transition is published to
//! the event broadcaster while the queue lock is held, so subscribers observe
//! transitions in the exact order they happened.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::EventBroadcaster;
use crate::queue::task::{Task, TaskPayload, TaskStatus, TaskType};
use crate::resource::MediaClass;

/// Longest error message stored on a task.
const MAX_ERROR_LEN: usize = 2000;

/// A submission before the queue assigns identity and state.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project: String,
    pub task_type: TaskType,
    pub resource_id: String,
    pub source: String,
    pub payload: TaskPayload,
}

/// Result of an enqueue: either a fresh task or the live duplicate.
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub task: Task,
    pub deduped: bool,
}

/// Queue counters, optionally scoped to one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project: Option<String>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub source: Option<String>,
}

/// One page of a task listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Default)]
struct QueueInner {
    tasks: HashMap<String, Task>,
    /// Pending task ids in arrival order, per media class.
    image_lane: VecDeque<String>,
    video_lane: VecDeque<String>,
    /// (project, task_type, resource_id) -> id of the live (non-terminal)
    /// task for that resource, if any.
    live_index: HashMap<(String, TaskType, String), String>,
}

impl QueueInner {
    fn lane_mut(&mut self, class: MediaClass) -> &mut VecDeque<String> {
        match class {
            MediaClass::Image => &mut self.image_lane,
            MediaClass::Video => &mut self.video_lane,
        }
    }
}

/// Task queue shared by the API handlers and the worker pool.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    broadcaster: Arc<EventBroadcaster>,
}

impl TaskQueue {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            broadcaster,
        }
    }

    /// Submit a task, deduplicating against live tasks for the same
    /// (project, task_type, resource_id). A dedup hit returns the existing
    /// task unchanged and publishes nothing.
    pub fn enqueue(&self, new_task: NewTask) -> EnqueueOutcome {
        let mut inner = self.inner.lock();

        let key = (
            new_task.project.clone(),
            new_task.task_type,
            new_task.resource_id.clone(),
        );
        if let Some(existing_id) = inner.live_index.get(&key) {
            if let Some(existing) = inner.tasks.get(existing_id) {
                debug!(
                    task_id = %existing.id,
                    project = %new_task.project,
                    task_type = %new_task.task_type,
                    resource_id = %new_task.resource_id,
                    "deduplicated enqueue onto live task"
                );
                return EnqueueOutcome {
                    task: existing.clone(),
                    deduped: true,
                };
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            project: new_task.project,
            task_type: new_task.task_type,
            resource_id: new_task.resource_id,
            status: TaskStatus::Queued,
            source: new_task.source,
            payload: new_task.payload,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            result: None,
        };

        inner.live_index.insert(key, task.id.clone());
        let class = task.media_class();
        inner.lane_mut(class).push_back(task.id.clone());
        inner.tasks.insert(task.id.clone(), task.clone());

        info!(
            task_id = %task.id,
            project = %task.project,
            task_type = %task.task_type,
            resource_id = %task.resource_id,
            source = %task.source,
            "task queued"
        );
        self.broadcaster.publish_task(&task);

        EnqueueOutcome {
            task,
            deduped: false,
        }
    }

    /// Hand the oldest queued task of `class` to a worker, marking it running.
    pub fn claim(&self, class: MediaClass) -> Option<Task> {
        let mut inner = self.inner.lock();

        let id = inner.lane_mut(class).pop_front()?;
        let task = inner.tasks.get_mut(&id)?;

        let now = Utc::now();
        task.status = TaskStatus::Running;
        task.started_at = Some(now);
        task.updated_at = now;
        let task = task.clone();

        self.broadcaster.publish_task(&task);
        Some(task)
    }

    /// Record success: artifact version, retries spent, terminal state.
    pub fn complete(
        &self,
        task_id: &str,
        version: u64,
        file: String,
        retry_count: u32,
    ) -> Result<Task> {
        self.finish(task_id, retry_count, |task, now| {
            task.status = TaskStatus::Succeeded;
            task.result = Some(crate::queue::task::TaskResult { version, file });
            task.finished_at = Some(now);
        })
    }

    /// Record failure with the (truncated) error message.
    pub fn fail(&self, task_id: &str, error: &str, retry_count: u32) -> Result<Task> {
        let error: String = error.chars().take(MAX_ERROR_LEN).collect();
        self.finish(task_id, retry_count, move |task, now| {
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            task.finished_at = Some(now);
        })
    }

    fn finish<F>(&self, task_id: &str, retry_count: u32, apply: F) -> Result<Task>
    where
        F: FnOnce(&mut Task, chrono::DateTime<Utc>),
    {
        let mut inner = self.inner.lock();

        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| AppError::TaskNotFound(task_id.to_string()))?;

        let now = Utc::now();
        task.retry_count = retry_count;
        task.updated_at = now;
        apply(task, now);
        let task = task.clone();

        // Terminal tasks no longer block re-submission for their resource.
        let key = (task.project.clone(), task.task_type, task.resource_id.clone());
        if inner.live_index.get(&key) == Some(&task.id) {
            inner.live_index.remove(&key);
        }

        info!(
            task_id = %task.id,
            status = %task.status,
            retry_count = task.retry_count,
            "task finished"
        );
        self.broadcaster.publish_task(&task);
        Ok(task)
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.inner.lock().tasks.get(task_id).cloned()
    }

    /// Page through tasks matching `filter`, ordered by `updated_at` desc.
    pub fn list(&self, filter: &TaskFilter, page: usize, page_size: usize) -> TaskPage {
        let inner = self.inner.lock();

        let mut matched: Vec<&Task> = inner
            .tasks
            .values()
            .filter(|t| Self::matches(t, filter))
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        let total = matched.len();
        // Saturate: an absurd page is an empty page, not an overflow.
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();

        TaskPage {
            items,
            total,
            page,
            page_size,
        }
    }

    /// Status counters, optionally scoped to one project.
    pub fn stats(&self, project: Option<&str>) -> TaskStats {
        let inner = self.inner.lock();
        let mut stats = TaskStats::default();
        for task in inner.tasks.values() {
            if let Some(project) = project {
                if task.project != project {
                    continue;
                }
            }
            match task.status {
                TaskStatus::Queued => stats.queued += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Succeeded => stats.succeeded += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
        }
        stats
    }

    /// Most recently updated tasks, for stream snapshots.
    pub fn recent(&self, project: Option<&str>, limit: usize) -> Vec<Task> {
        let filter = TaskFilter {
            project: project.map(str::to_string),
            ..TaskFilter::default()
        };
        self.list(&filter, 1, limit).items
    }

    fn matches(task: &Task, filter: &TaskFilter) -> bool {
        if let Some(project) = &filter.project {
            if &task.project != project {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(task_type) = filter.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(source) = &filter.source {
            if &task.source != source {
                return false;
            }
        }
        true
    }
}
