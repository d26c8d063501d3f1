use crate::event::Event;
use crate::phase::Phase;
use crate::prose::Prose;
use crate::task::Task;
use crate::test::Test;
use crate::types::{EpicStatus, PhaseStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Metadata / CurrentState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.assignee.is_none() && self.estimated_effort.is_none()
    }
}

/// Cached projection of where work currently stands. Refreshed by the
/// lifecycle service after every accepted mutation; never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
}

pub const DEFAULT_NEXT_ACTION: &str = "Start next phase";

impl CurrentState {
    pub fn new() -> Self {
        Self {
            active_phase: None,
            active_task: None,
            next_action: Some(DEFAULT_NEXT_ACTION.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Epic
// ---------------------------------------------------------------------------

/// The document root. Owns every phase, task, test, and event; all mutation
/// flows through the lifecycle service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Epic {
    pub id: String,
    pub name: String,
    pub status: EpicStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<CurrentState>,
    #[serde(skip_serializing_if = "Prose::is_empty")]
    pub description: Prose,
    #[serde(skip_serializing_if = "Prose::is_empty")]
    pub workflow: Prose,
    #[serde(skip_serializing_if = "Prose::is_empty")]
    pub requirements: Prose,
    #[serde(skip_serializing_if = "Prose::is_empty")]
    pub dependencies: Prose,
    pub phases: Vec<Phase>,
    pub tasks: Vec<Task>,
    pub tests: Vec<Test>,
    pub events: Vec<Event>,
}

impl Epic {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: EpicStatus::Pending,
            created_at,
            assignee: None,
            metadata: None,
            current_state: Some(CurrentState::new()),
            description: Prose::default(),
            workflow: Prose::default(),
            requirements: Prose::default(),
            dependencies: Prose::default(),
            phases: Vec::new(),
            tasks: Vec::new(),
            tests: Vec::new(),
            events: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------------

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn phase_mut(&mut self, id: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn test(&self, id: &str) -> Option<&Test> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub fn test_mut(&mut self, id: &str) -> Option<&mut Test> {
        self.tests.iter_mut().find(|t| t.id == id)
    }

    // ---------------------------------------------------------------------------
    // Active-work projections
    // ---------------------------------------------------------------------------

    /// The unique phase with status wip, if any (invariant: at most one).
    pub fn active_phase(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| p.status == PhaseStatus::Wip)
    }

    /// The unique task with status wip, if any (invariant: at most one per
    /// phase, and a wip task implies its phase is wip).
    pub fn active_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Wip)
    }

    pub fn active_task_in_phase(&self, phase_id: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.phase_id == phase_id && t.status == TaskStatus::Wip)
    }

    // ---------------------------------------------------------------------------
    // Scoped iterators
    // ---------------------------------------------------------------------------

    pub fn tasks_in_phase<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.tasks.iter().filter(move |t| t.phase_id == phase_id)
    }

    pub fn tests_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Test> {
        self.tests.iter().filter(move |t| t.task_id == task_id)
    }

    /// Tests scoped to a phase, joined through their owning task when the
    /// test doesn't carry an explicit phase_id.
    pub fn tests_in_phase<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a Test> {
        self.tests.iter().filter(move |t| {
            match &t.phase_id {
                Some(p) => p == phase_id,
                None => self
                    .task(&t.task_id)
                    .map(|task| task.phase_id == phase_id)
                    .unwrap_or(false),
            }
        })
    }

    // ---------------------------------------------------------------------------
    // Event log
    // ---------------------------------------------------------------------------

    /// Append-only: the log is only ever pushed to, never reordered.
    pub fn append_event(&mut self, event: Event) {
        self.events.push(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
