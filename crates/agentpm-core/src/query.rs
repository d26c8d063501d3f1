//! Read-only projections over a loaded epic. A service instance caches one
//! document for the lifetime of a command; nothing here mutates.

use crate::epic::Epic;
use crate::error::{AgentPmError, Result};
use crate::event::{self, Event};
use crate::store::EpicStore;
use crate::types::{EntityKind, EpicStatus, PhaseStatus, TaskStatus, TestResult, TestStatus};
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Projection rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PhaseRow {
    pub id: String,
    pub name: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub phase_id: String,
    pub name: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRow {
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub test_status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

/// A not-done test joined with its task's phase for context.
#[derive(Debug, Clone, Serialize)]
pub struct FailingTestRow {
    pub id: String,
    pub name: String,
    pub task_id: String,
    pub phase_id: String,
    pub phase_name: String,
    pub test_status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusRollup {
    pub id: String,
    pub name: String,
    pub status: EpicStatus,
    pub completed_phases: usize,
    pub total_phases: usize,
    pub passing_tests: usize,
    pub failing_tests: usize,
    pub completion_percent: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveWork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<PhaseRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<TaskRow>,
    pub next_action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingWork {
    pub phases: Vec<PhaseRow>,
    pub tasks: Vec<TaskRow>,
    pub tests: Vec<TestRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRef {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedItems {
    pub kind: EntityKind,
    pub id: String,
    pub parents: Vec<ItemRef>,
    pub children: Vec<ItemRef>,
    pub risk: RiskTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateWarning {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Progress counting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Progress {
    pub total_phases: usize,
    pub completed_phases: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_tests: usize,
    pub completed_tests: usize,
    pub completion_percent: u8,
}

pub fn progress(epic: &Epic) -> Progress {
    let total_phases = epic.phases.len();
    let completed_phases = epic
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Done)
        .count();
    let total_tasks = epic.tasks.len();
    let completed_tasks = epic
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count();
    let total_tests = epic.tests.len();
    let completed_tests = epic
        .tests
        .iter()
        .filter(|t| t.test_status == TestStatus::Done)
        .count();

    Progress {
        total_phases,
        completed_phases,
        total_tasks,
        completed_tasks,
        total_tests,
        completed_tests,
        completion_percent: weighted_percent(
            completed_phases,
            total_phases,
            completed_tasks,
            total_tasks,
            completed_tests,
            total_tests,
        ),
    }
}

/// Weighted completion: phases 40%, tasks 40%, tests 20%. Empty categories
/// contribute nothing; the sum is truncated once at the end.
fn weighted_percent(
    done_phases: usize,
    phases: usize,
    done_tasks: usize,
    tasks: usize,
    done_tests: usize,
    tests: usize,
) -> u8 {
    // Multiply before dividing so exact fractions stay exact (3/5 of 40 is
    // 24.0, not 23.999…).
    let part = |done: usize, total: usize, weight: f64| -> f64 {
        if total == 0 {
            0.0
        } else {
            done as f64 * weight / total as f64
        }
    };
    let percent = part(done_phases, phases, 40.0)
        + part(done_tasks, tasks, 40.0)
        + part(done_tests, tests, 20.0);
    percent as u8
}

// ---------------------------------------------------------------------------
// Free projections (shared with the lifecycle service)
// ---------------------------------------------------------------------------

/// The wip phase id, falling back to the phase of a wip task.
pub fn active_phase_id(epic: &Epic) -> Option<String> {
    epic.active_phase()
        .map(|p| p.id.clone())
        .or_else(|| epic.active_task().map(|t| t.phase_id.clone()))
}

/// Next-action priority: failing tests, then the task in flight, then the
/// next pending task of the active phase, then the next pending phase.
pub fn next_action(epic: &Epic) -> String {
    let failing: Vec<&str> = epic
        .tests
        .iter()
        .filter(|t| {
            t.test_result == Some(TestResult::Failing) && t.test_status != TestStatus::Cancelled
        })
        .map(|t| t.name.as_str())
        .collect();
    if !failing.is_empty() {
        return format!("Fix failing tests: {}", failing.join(", "));
    }

    if let Some(task) = epic.active_task() {
        return format!("Continue work on: {}", task.name);
    }

    if let Some(phase) = epic.active_phase() {
        if let Some(task) = epic
            .tasks_in_phase(&phase.id)
            .find(|t| t.status == TaskStatus::Pending)
        {
            return format!("Start next task: {}", task.name);
        }
    }

    if let Some(phase) = epic
        .phases
        .iter()
        .find(|p| p.status == PhaseStatus::Pending)
    {
        return format!("Start next phase: {}", phase.name);
    }

    "Epic ready for completion".to_string()
}

// ---------------------------------------------------------------------------
// QueryService
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct QueryService {
    epic: Option<Epic>,
}

impl QueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(&mut self, store: &dyn EpicStore, path: &Path) -> Result<()> {
        self.epic = Some(store.load_epic(path)?);
        Ok(())
    }

    pub fn set_epic(&mut self, epic: Epic) {
        self.epic = Some(epic);
    }

    pub fn epic(&self) -> Result<&Epic> {
        self.epic.as_ref().ok_or(AgentPmError::NoEpicLoaded)
    }

    // ---------------------------------------------------------------------------
    // Rollup
    // ---------------------------------------------------------------------------

    pub fn status(&self) -> Result<StatusRollup> {
        let epic = self.epic()?;
        let progress = progress(epic);
        // Rollup counts go by test_status: done is passing, anything else
        // still counts against the epic.
        let passing = epic
            .tests
            .iter()
            .filter(|t| t.test_status == TestStatus::Done)
            .count();
        Ok(StatusRollup {
            id: epic.id.clone(),
            name: epic.name.clone(),
            status: epic.status,
            completed_phases: progress.completed_phases,
            total_phases: progress.total_phases,
            passing_tests: passing,
            failing_tests: epic.tests.len() - passing,
            completion_percent: progress.completion_percent,
        })
    }

    // ---------------------------------------------------------------------------
    // Active / pending work
    // ---------------------------------------------------------------------------

    pub fn current(&self) -> Result<ActiveWork> {
        let epic = self.epic()?;
        let active_phase = match epic.active_phase() {
            Some(p) => Some(phase_row(p)),
            None => active_phase_id(epic)
                .and_then(|id| epic.phase(&id).map(phase_row)),
        };
        Ok(ActiveWork {
            active_phase,
            active_task: epic.active_task().map(task_row),
            next_action: next_action(epic),
        })
    }

    /// Work not yet done, in document order. Tasks go by `status != done`;
    /// only tests additionally drop cancelled entries.
    pub fn pending(&self) -> Result<PendingWork> {
        let epic = self.epic()?;
        Ok(PendingWork {
            phases: epic
                .phases
                .iter()
                .filter(|p| p.status != PhaseStatus::Done)
                .map(phase_row)
                .collect(),
            tasks: epic
                .tasks
                .iter()
                .filter(|t| t.status != TaskStatus::Done)
                .map(task_row)
                .collect(),
            tests: epic
                .tests
                .iter()
                .filter(|t| !t.test_status.is_terminal())
                .map(test_row)
                .collect(),
        })
    }

    /// Tests still counting against the epic (test_status not done), with
    /// phase context joined through the owning task.
    pub fn failing_tests(&self) -> Result<Vec<FailingTestRow>> {
        let epic = self.epic()?;
        Ok(epic
            .tests
            .iter()
            .filter(|t| t.test_status != TestStatus::Done)
            .map(|t| {
                let phase_id = t
                    .phase_id
                    .clone()
                    .or_else(|| epic.task(&t.task_id).map(|task| task.phase_id.clone()))
                    .unwrap_or_default();
                let phase_name = epic
                    .phase(&phase_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                FailingTestRow {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    task_id: t.task_id.clone(),
                    phase_id,
                    phase_name,
                    test_status: t.test_status,
                    result: t.test_result,
                }
            })
            .collect())
    }

    // ---------------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------------

    pub fn recent_events(&self, limit: usize) -> Result<Vec<&Event>> {
        Ok(event::recent(&self.epic()?.events, limit))
    }

    // ---------------------------------------------------------------------------
    // Related items / impact
    // ---------------------------------------------------------------------------

    pub fn related(&self, kind: EntityKind, id: &str) -> Result<RelatedItems> {
        let epic = self.epic()?;
        let epic_ref = ItemRef {
            kind: EntityKind::Epic,
            id: epic.id.clone(),
            name: epic.name.clone(),
        };

        match kind {
            EntityKind::Epic => Ok(RelatedItems {
                kind,
                id: epic.id.clone(),
                parents: Vec::new(),
                children: epic.phases.iter().map(phase_ref).collect(),
                risk: RiskTier::Low,
            }),
            EntityKind::Phase => {
                let phase = epic
                    .phase(id)
                    .ok_or_else(|| AgentPmError::PhaseNotFound(id.to_string()))?;
                let tasks = epic.tasks_in_phase(&phase.id).count();
                let mut children: Vec<ItemRef> =
                    epic.tasks_in_phase(&phase.id).map(task_ref).collect();
                children.extend(epic.tests_in_phase(&phase.id).map(test_ref));
                Ok(RelatedItems {
                    kind,
                    id: phase.id.clone(),
                    parents: vec![epic_ref],
                    children,
                    risk: if tasks > 10 {
                        RiskTier::High
                    } else if tasks > 5 {
                        RiskTier::Medium
                    } else {
                        RiskTier::Low
                    },
                })
            }
            EntityKind::Task => {
                let task = epic
                    .task(id)
                    .ok_or_else(|| AgentPmError::TaskNotFound(id.to_string()))?;
                let mut parents = Vec::new();
                if let Some(phase) = epic.phase(&task.phase_id) {
                    parents.push(phase_ref(phase));
                }
                let tests: Vec<ItemRef> = epic.tests_for_task(&task.id).map(test_ref).collect();
                let risk = if tests.len() > 3 {
                    RiskTier::Medium
                } else {
                    RiskTier::Low
                };
                Ok(RelatedItems {
                    kind,
                    id: task.id.clone(),
                    parents,
                    children: tests,
                    risk,
                })
            }
            EntityKind::Test => {
                let test = epic
                    .test(id)
                    .ok_or_else(|| AgentPmError::TestNotFound(id.to_string()))?;
                let mut parents = Vec::new();
                if let Some(task) = epic.task(&test.task_id) {
                    parents.push(task_ref(task));
                    if let Some(phase) = epic.phase(&task.phase_id) {
                        parents.push(phase_ref(phase));
                    }
                }
                Ok(RelatedItems {
                    kind,
                    id: test.id.clone(),
                    parents,
                    children: Vec::new(),
                    risk: RiskTier::Low,
                })
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Structural validation (warnings only, never gates a transition)
    // ---------------------------------------------------------------------------

    pub fn state_warnings(&self) -> Result<Vec<StateWarning>> {
        let epic = self.epic()?;
        let mut warnings = Vec::new();

        let wip_phases: Vec<&str> = epic
            .phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Wip)
            .map(|p| p.id.as_str())
            .collect();
        if wip_phases.len() > 1 {
            warnings.push(StateWarning {
                message: format!("multiple active phases: {}", wip_phases.join(", ")),
            });
        }

        let wip_tasks: Vec<&str> = epic
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Wip)
            .map(|t| t.id.as_str())
            .collect();
        if wip_tasks.len() > 1 {
            warnings.push(StateWarning {
                message: format!("multiple active tasks: {}", wip_tasks.join(", ")),
            });
        }

        for task in epic.tasks.iter().filter(|t| t.status == TaskStatus::Wip) {
            match epic.phase(&task.phase_id) {
                Some(phase) if phase.status != PhaseStatus::Wip => warnings.push(StateWarning {
                    message: format!(
                        "task {} is active but its phase {} is {}",
                        task.id, phase.id, phase.status
                    ),
                }),
                _ => {}
            }
        }

        for phase in epic.phases.iter().filter(|p| p.status == PhaseStatus::Wip) {
            let tasks: Vec<&crate::task::Task> = epic.tasks_in_phase(&phase.id).collect();
            if !tasks.is_empty() && tasks.iter().all(|t| t.status == TaskStatus::Done) {
                warnings.push(StateWarning {
                    message: format!(
                        "phase {} is active but all of its tasks are done",
                        phase.id
                    ),
                });
            }
        }

        // Dangling references are reported, never fatal.
        for task in &epic.tasks {
            if epic.phase(&task.phase_id).is_none() {
                warnings.push(StateWarning {
                    message: format!("task {} references unknown phase {}", task.id, task.phase_id),
                });
            }
        }
        for test in &epic.tests {
            if epic.task(&test.task_id).is_none() {
                warnings.push(StateWarning {
                    message: format!("test {} references unknown task {}", test.id, test.task_id),
                });
            } else if let Some(phase_id) = &test.phase_id {
                let task_phase = epic.task(&test.task_id).map(|t| t.phase_id.as_str());
                if task_phase != Some(phase_id.as_str()) {
                    warnings.push(StateWarning {
                        message: format!(
                            "test {} phase_id {} does not match its task's phase",
                            test.id, phase_id
                        ),
                    });
                }
            }
        }

        Ok(warnings)
    }
}

fn phase_row(p: &crate::phase::Phase) -> PhaseRow {
    PhaseRow {
        id: p.id.clone(),
        name: p.name.clone(),
        status: p.status,
    }
}

fn task_row(t: &crate::task::Task) -> TaskRow {
    TaskRow {
        id: t.id.clone(),
        phase_id: t.phase_id.clone(),
        name: t.name.clone(),
        status: t.status,
    }
}

fn test_row(t: &crate::test::Test) -> TestRow {
    TestRow {
        id: t.id.clone(),
        task_id: t.task_id.clone(),
        name: t.name.clone(),
        test_status: t.test_status,
        result: t.test_result,
    }
}

fn phase_ref(p: &crate::phase::Phase) -> ItemRef {
    ItemRef {
        kind: EntityKind::Phase,
        id: p.id.clone(),
        name: p.name.clone(),
    }
}

fn task_ref(t: &crate::task::Task) -> ItemRef {
    ItemRef {
        kind: EntityKind::Task,
        id: t.id.clone(),
        name: t.name.clone(),
    }
}

fn test_ref(t: &crate::test::Test) -> ItemRef {
    ItemRef {
        kind: EntityKind::Test,
        id: t.id.clone(),
        name: t.name.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
