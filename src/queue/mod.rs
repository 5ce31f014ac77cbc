//! Task queue and worker pool

pub mod task;
pub mod task_queue;
pub mod worker;

pub use task::{Task, TaskPayload, TaskResult, TaskStatus, TaskType};
pub use task_queue::{EnqueueOutcome, NewTask, TaskFilter, TaskPage, TaskQueue, TaskStats};
pub use worker::WorkerPool;
