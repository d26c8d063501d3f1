use crate::prose::Prose;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event type vocabulary
// ---------------------------------------------------------------------------

pub const EPIC_STARTED: &str = "epic_started";
pub const EPIC_COMPLETED: &str = "epic_completed";
pub const PHASE_STARTED: &str = "phase_started";
pub const PHASE_COMPLETED: &str = "phase_completed";
pub const TASK_STARTED: &str = "task_started";
pub const TASK_COMPLETED: &str = "task_completed";
pub const TASK_CANCELLED: &str = "task_cancelled";
pub const TEST_STARTED: &str = "test_started";
pub const TEST_PASSED: &str = "test_passed";
pub const TEST_FAILED: &str = "test_failed";
pub const TEST_CANCELLED: &str = "test_cancelled";
pub const BLOCKER: &str = "blocker";

/// Manual log entries default to this type.
pub const IMPLEMENTATION: &str = "implementation";

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One entry of the epic's append-only activity log. Events are never edited
/// or removed once appended; on-disk order is chronological and reads are
/// served newest-first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    pub data: Prose,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        data: impl Into<Prose>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            timestamp,
            agent: None,
            phase_id: None,
            task_id: None,
            test_id: None,
            data: data.into(),
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_phase(mut self, phase_id: impl Into<String>) -> Self {
        self.phase_id = Some(phase_id.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_test(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Log reads
// ---------------------------------------------------------------------------

pub const DEFAULT_EVENT_LIMIT: usize = 10;
pub const MAX_EVENT_LIMIT: usize = 100;

/// Newest-first view of the log, limit clamped to [1, 100].
pub fn recent(events: &[Event], limit: usize) -> Vec<&Event> {
    let limit = limit.clamp(1, MAX_EVENT_LIMIT);
    let mut out: Vec<&Event> = events.iter().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out.truncate(limit);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
