//! Task event broadcaster
//!
//! Fan-out of task state transitions to SSE subscribers. Events carry a
//! process-wide monotonic id; a bounded ring of recent events lets a
//! reconnecting client resume from its last seen id without a snapshot, as
//! long as the cursor is still inside the ring.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::EventsConfig;
use crate::queue::task::Task;

/// One published event: monotonic id, owning project, SSE data payload.
#[derive(Debug)]
pub struct StoredEvent {
    pub id: u64,
    pub project: String,
    pub payload: serde_json::Value,
}

/// What a new subscriber must do before going live.
#[derive(Debug)]
pub enum ResumeMode {
    /// Cursor was inside the ring: deliver these, in order, then live events.
    Replay(Vec<Arc<StoredEvent>>),
    /// No cursor, or cursor fell out of the ring: the caller sends a full
    /// snapshot stamped with this event id, then live events.
    Snapshot { last_event_id: u64 },
}

/// A registered subscriber: resume instructions plus the live channel.
pub struct Subscription {
    pub resume: ResumeMode,
    pub receiver: mpsc::UnboundedReceiver<Arc<StoredEvent>>,
}

struct Subscriber {
    project: Option<String>,
    sender: mpsc::UnboundedSender<Arc<StoredEvent>>,
}

struct BroadcasterInner {
    next_id: u64,
    ring: VecDeque<Arc<StoredEvent>>,
    subscribers: Vec<Subscriber>,
}

/// Shared broadcaster; cheap to clone behind an `Arc`.
pub struct EventBroadcaster {
    inner: Mutex<BroadcasterInner>,
    ring_capacity: usize,
}

impl EventBroadcaster {
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            inner: Mutex::new(BroadcasterInner {
                next_id: 1,
                ring: VecDeque::with_capacity(config.ring_capacity),
                subscribers: Vec::new(),
            }),
            ring_capacity: config.ring_capacity.max(1),
        }
    }

    /// Id of the most recently published event, 0 before the first one.
    #[cfg(test)]
    fn last_event_id(&self) -> u64 {
        self.inner.lock().next_id - 1
    }

    /// Publish a task transition to the ring and all matching subscribers.
    ///
    /// Subscribers whose receiver is gone are pruned here rather than on a
    /// timer. Returns the assigned event id.
    pub fn publish_task(&self, task: &Task) -> u64 {
        let mut inner = self.inner.lock();

        let id = inner.next_id;
        inner.next_id += 1;

        let event = Arc::new(StoredEvent {
            id,
            project: task.project.clone(),
            payload: json!({
                "type": "task",
                "task": task,
            }),
        });

        if inner.ring.len() == self.ring_capacity {
            inner.ring.pop_front();
        }
        inner.ring.push_back(event.clone());

        inner.subscribers.retain(|subscriber| {
            if let Some(project) = &subscriber.project {
                if project != &event.project {
                    // Not for this subscriber, but its channel may still be
                    // alive; keep it unless the receiver is closed.
                    return !subscriber.sender.is_closed();
                }
            }
            subscriber.sender.send(event.clone()).is_ok()
        });

        debug!(event_id = id, project = %event.project, "published task event");
        id
    }

    /// Register a subscriber, atomically deciding how it catches up.
    ///
    /// Registration and the resume decision happen under one lock, so no
    /// event can fall between the replay (or snapshot stamp) and the live
    /// channel.
    pub fn subscribe(&self, project: Option<String>, last_event_id: Option<u64>) -> Subscription {
        let mut inner = self.inner.lock();
        let latest = inner.next_id - 1;

        let resume = match last_event_id {
            Some(cursor) if cursor <= latest => {
                let in_window = match inner.ring.front() {
                    // Ring must reach back to the event right after the cursor.
                    Some(oldest) => oldest.id <= cursor + 1,
                    None => cursor == latest,
                };
                if in_window {
                    let missed = inner
                        .ring
                        .iter()
                        .filter(|e| {
                            e.id > cursor
                                && project.as_deref().map_or(true, |p| p == e.project)
                        })
                        .cloned()
                        .collect();
                    ResumeMode::Replay(missed)
                } else {
                    ResumeMode::Snapshot {
                        last_event_id: latest,
                    }
                }
            }
            // A cursor from the future means our state restarted; resync.
            _ => ResumeMode::Snapshot {
                last_event_id: latest,
            },
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        inner.subscribers.push(Subscriber { project, sender });

        Subscription { resume, receiver }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::task::{TaskPayload, TaskStatus, TaskType};
    use chrono::Utc;

    fn task(project: &str, resource_id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: format!("task-{}", resource_id),
            project: project.to_string(),
            task_type: TaskType::Storyboard,
            resource_id: resource_id.to_string(),
            status: TaskStatus::Queued,
            source: "webui".to_string(),
            payload: TaskPayload::default(),
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            result: None,
        }
    }

    fn broadcaster(ring_capacity: usize) -> EventBroadcaster {
        EventBroadcaster::new(&EventsConfig {
            ring_capacity,
            ..EventsConfig::default()
        })
    }

    #[test]
    fn test_ids_are_monotonic_and_dense() {
        let broadcaster = broadcaster(16);
        assert_eq!(broadcaster.publish_task(&task("demo", "a")), 1);
        assert_eq!(broadcaster.publish_task(&task("demo", "b")), 2);
        assert_eq!(broadcaster.last_event_id(), 2);
    }

    #[tokio::test]
    async fn test_live_delivery_with_project_filter() {
        let broadcaster = broadcaster(16);
        let mut demo = broadcaster.subscribe(Some("demo".to_string()), None);
        let mut all = broadcaster.subscribe(None, None);

        broadcaster.publish_task(&task("demo", "a"));
        broadcaster.publish_task(&task("other", "b"));

        assert_eq!(demo.receiver.recv().await.unwrap().id, 1);
        assert!(demo.receiver.try_recv().is_err());

        assert_eq!(all.receiver.recv().await.unwrap().id, 1);
        assert_eq!(all.receiver.recv().await.unwrap().id, 2);
    }

    #[test]
    fn test_in_window_cursor_replays_without_snapshot() {
        let broadcaster = broadcaster(16);
        for n in 0..5 {
            broadcaster.publish_task(&task("demo", &n.to_string()));
        }

        let subscription = broadcaster.subscribe(None, Some(2));
        match subscription.resume {
            ResumeMode::Replay(events) => {
                let ids: Vec<u64> = events.iter().map(|e| e.id).collect();
                assert_eq!(ids, vec![3, 4, 5]);
            }
            ResumeMode::Snapshot { .. } => panic!("expected replay"),
        }
    }

    #[test]
    fn test_current_cursor_replays_nothing() {
        let broadcaster = broadcaster(16);
        broadcaster.publish_task(&task("demo", "a"));

        match broadcaster.subscribe(None, Some(1)).resume {
            ResumeMode::Replay(events) => assert!(events.is_empty()),
            ResumeMode::Snapshot { .. } => panic!("expected replay"),
        }
    }

    #[test]
    fn test_stale_cursor_falls_back_to_snapshot() {
        let broadcaster = broadcaster(4);
        for n in 0..10 {
            broadcaster.publish_task(&task("demo", &n.to_string()));
        }

        // Ring now holds ids 7..=10; a cursor of 2 is unrecoverable.
        match broadcaster.subscribe(None, Some(2)).resume {
            ResumeMode::Snapshot { last_event_id } => assert_eq!(last_event_id, 10),
            ResumeMode::Replay(_) => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_future_cursor_falls_back_to_snapshot() {
        let broadcaster = broadcaster(4);
        broadcaster.publish_task(&task("demo", "a"));

        match broadcaster.subscribe(None, Some(99)).resume {
            ResumeMode::Snapshot { last_event_id } => assert_eq!(last_event_id, 1),
            ResumeMode::Replay(_) => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_no_cursor_means_snapshot() {
        let broadcaster = broadcaster(4);
        match broadcaster.subscribe(None, None).resume {
            ResumeMode::Snapshot { last_event_id } => assert_eq!(last_event_id, 0),
            ResumeMode::Replay(_) => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned_on_publish() {
        let broadcaster = broadcaster(16);
        let subscription = broadcaster.subscribe(Some("demo".to_string()), None);
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(subscription);
        broadcaster.publish_task(&task("demo", "a"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
