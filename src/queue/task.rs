//! Task domain types
//!
//! A task is one requested generation for one resource. Field names are wire
//! format: tasks are embedded verbatim in API responses and stream events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::{MediaClass, ResourceKind};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unsupported task status: {}", other)),
        }
    }
}

/// What kind of artifact a task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Storyboard,
    Video,
    Character,
    Clue,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Storyboard => "storyboard",
            TaskType::Video => "video",
            TaskType::Character => "character",
            TaskType::Clue => "clue",
        }
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            TaskType::Storyboard => ResourceKind::Storyboards,
            TaskType::Video => ResourceKind::Videos,
            TaskType::Character => ResourceKind::Characters,
            TaskType::Clue => ResourceKind::Clues,
        }
    }

    pub fn media_class(&self) -> MediaClass {
        self.resource_kind().media_class()
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "storyboard" => Ok(TaskType::Storyboard),
            "video" => Ok(TaskType::Video),
            "character" => Ok(TaskType::Character),
            "clue" => Ok(TaskType::Clue),
            other => Err(format!("unsupported task type: {}", other)),
        }
    }
}

/// Generation parameters carried by a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub prompt: String,

    /// Script the prompt was derived from; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Paths relative to the project root, e.g. `characters/jade.png`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,
}

/// Outcome of a succeeded task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub version: u64,
    pub file: String,
}

/// One generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project: String,
    pub task_type: TaskType,
    pub resource_id: String,
    pub status: TaskStatus,
    /// Who asked for this: "webui", "skill", ...
    pub source: String,
    pub payload: TaskPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl Task {
    pub fn media_class(&self) -> MediaClass {
        self.task_type.media_class()
    }

    pub fn resource_kind(&self) -> ResourceKind {
        self.task_type.resource_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_maps_to_resource_and_class() {
        assert_eq!(TaskType::Storyboard.resource_kind(), ResourceKind::Storyboards);
        assert_eq!(TaskType::Video.media_class(), MediaClass::Video);
        assert_eq!(TaskType::Character.media_class(), MediaClass::Image);
        assert_eq!(TaskType::Clue.media_class(), MediaClass::Image);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }
}
