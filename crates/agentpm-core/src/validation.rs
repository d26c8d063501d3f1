//! Completion gating. The lifecycle service consults these checks before any
//! completion transition; the result carries enough structure for error
//! output, hints, and the multi-line refusal message.

use crate::epic::Epic;
use crate::error::{AgentPmError, Result};
use crate::query::{progress, Progress};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PendingPhase {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTask {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTest {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailingTest {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// What was being completed: "epic", "phase 1A", "task 1A_1".
    pub subject: String,
    pub pending_phases: Vec<PendingPhase>,
    pub pending_tasks: Vec<PendingTask>,
    pub pending_tests: Vec<PendingTest>,
    pub failing_tests: Vec<FailingTest>,
    pub summary: Progress,
    pub suggestions: Vec<String>,
}

const MAX_NAMED: usize = 3;

impl ValidationResult {
    /// Multi-line refusal text: a header with the blocking counts, a progress
    /// line, then up to three named items per category.
    pub fn message(&self) -> String {
        if self.is_valid {
            return format!("{} is ready to complete", self.subject);
        }

        let mut counts = Vec::new();
        push_count(&mut counts, self.pending_phases.len(), "phase", "pending");
        push_count(&mut counts, self.pending_tasks.len(), "task", "pending");
        push_count(&mut counts, self.pending_tests.len(), "test", "unresolved");
        push_count(&mut counts, self.failing_tests.len(), "test", "failing");

        let mut out = format!("Cannot complete {}: {}", self.subject, counts.join(", "));
        out.push_str(&format!(
            "\nProgress: phases {}/{}, tasks {}/{}, tests {}/{} ({}% complete)",
            self.summary.completed_phases,
            self.summary.total_phases,
            self.summary.completed_tasks,
            self.summary.total_tasks,
            self.summary.completed_tests,
            self.summary.total_tests,
            self.summary.completion_percent,
        ));

        named_line(
            &mut out,
            "Pending phases",
            self.pending_phases.iter().map(|p| (&p.id, &p.name)),
        );
        named_line(
            &mut out,
            "Pending tasks",
            self.pending_tasks.iter().map(|t| (&t.id, &t.name)),
        );
        named_line(
            &mut out,
            "Unresolved tests",
            self.pending_tests.iter().map(|t| (&t.id, &t.name)),
        );
        named_line(
            &mut out,
            "Failing tests",
            self.failing_tests.iter().map(|t| (&t.id, &t.name)),
        );
        out
    }
}

fn push_count(counts: &mut Vec<String>, n: usize, noun: &str, state: &str) {
    if n > 0 {
        let plural = if n == 1 { "" } else { "s" };
        counts.push(format!("{n} {noun}{plural} {state}"));
    }
}

fn named_line<'a>(
    out: &mut String,
    label: &str,
    items: impl Iterator<Item = (&'a String, &'a String)>,
) {
    let items: Vec<_> = items.collect();
    if items.is_empty() {
        return;
    }
    let mut names: Vec<String> = items
        .iter()
        .take(MAX_NAMED)
        .map(|(id, name)| format!("{id} ({name})"))
        .collect();
    if items.len() > MAX_NAMED {
        names.push("…".to_string());
    }
    out.push_str(&format!("\n{label}: {}", names.join(", ")));
}

// ---------------------------------------------------------------------------
// Epic completion
// ---------------------------------------------------------------------------

/// Invariant: an epic may complete only when every phase is done and every
/// test is passing or cancelled.
pub fn validate_epic_completion(epic: &Epic) -> ValidationResult {
    let pending_phases: Vec<PendingPhase> = epic
        .phases
        .iter()
        .filter(|p| p.status != crate::types::PhaseStatus::Done)
        .map(|p| PendingPhase {
            id: p.id.clone(),
            name: p.name.clone(),
        })
        .collect();

    let failing_tests: Vec<FailingTest> = epic
        .tests
        .iter()
        .filter(|t| t.blocks_epic_completion())
        .map(|t| FailingTest {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.as_str().to_string(),
        })
        .collect();

    let mut suggestions = Vec::new();
    if let Some(p) = pending_phases.first() {
        suggestions.push(format!("Complete phase {}: done-phase {}", p.id, p.id));
    }
    if let Some(t) = failing_tests.first() {
        suggestions.push(format!(
            "Fix test {} (pass-test {}) or cancel it with a reason",
            t.id, t.id
        ));
    }

    let is_valid = pending_phases.is_empty() && failing_tests.is_empty();
    ValidationResult {
        is_valid,
        subject: "epic".to_string(),
        pending_phases,
        pending_tasks: Vec::new(),
        pending_tests: Vec::new(),
        failing_tests,
        summary: progress(epic),
        suggestions,
    }
}

// ---------------------------------------------------------------------------
// Phase completion
// ---------------------------------------------------------------------------

/// Invariant: a phase may complete only when every task in it is done or
/// cancelled and every test scoped to it is done or cancelled.
pub fn validate_phase_completion(epic: &Epic, phase_id: &str) -> Result<ValidationResult> {
    let phase = epic
        .phase(phase_id)
        .ok_or_else(|| AgentPmError::PhaseNotFound(phase_id.to_string()))?;

    let pending_tasks: Vec<PendingTask> = epic
        .tasks_in_phase(&phase.id)
        .filter(|t| !t.status.is_terminal())
        .map(|t| PendingTask {
            id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect();

    let pending_tests: Vec<PendingTest> = epic
        .tests_in_phase(&phase.id)
        .filter(|t| !t.test_status.is_terminal())
        .map(|t| PendingTest {
            id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect();

    let mut suggestions = Vec::new();
    if let Some(t) = pending_tasks.first() {
        suggestions.push(format!("Finish task {}: done-task {}", t.id, t.id));
    }
    if let Some(t) = pending_tests.first() {
        suggestions.push(format!("Resolve test {}: pass-test {}", t.id, t.id));
    }

    let is_valid = pending_tasks.is_empty() && pending_tests.is_empty();
    Ok(ValidationResult {
        is_valid,
        subject: format!("phase {phase_id}"),
        pending_phases: Vec::new(),
        pending_tasks,
        pending_tests,
        failing_tests: Vec::new(),
        summary: progress(epic),
        suggestions,
    })
}

// ---------------------------------------------------------------------------
// Task completion
// ---------------------------------------------------------------------------

/// Invariant: a task may complete only when every one of its tests is done
/// or cancelled.
pub fn validate_task_completion(epic: &Epic, task_id: &str) -> Result<ValidationResult> {
    let task = epic
        .task(task_id)
        .ok_or_else(|| AgentPmError::TaskNotFound(task_id.to_string()))?;

    let pending_tests: Vec<PendingTest> = epic
        .tests_for_task(&task.id)
        .filter(|t| !t.test_status.is_terminal())
        .map(|t| PendingTest {
            id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect();

    let mut suggestions = Vec::new();
    if let Some(t) = pending_tests.first() {
        suggestions.push(format!("Resolve test {}: pass-test {}", t.id, t.id));
    }

    let is_valid = pending_tests.is_empty();
    Ok(ValidationResult {
        is_valid,
        subject: format!("task {task_id}"),
        pending_phases: Vec::new(),
        pending_tasks: Vec::new(),
        pending_tests,
        failing_tests: Vec::new(),
        summary: progress(epic),
        suggestions,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::task::Task;
    use crate::test::Test;
    use crate::types::{PhaseStatus, TaskStatus, TestResult, TestStatus};
    use chrono::{TimeZone, Utc};

    fn blocked_epic() -> Epic {
        let created = Utc.with_ymd_and_hms(2025, 8, 15, 9, 0, 0).unwrap();
        let mut epic = Epic::new("8", "Schema Management", created);

        let mut p1 = Phase::new("P1", "Phase One");
        p1.status = PhaseStatus::Done;
        epic.phases.push(p1);
        epic.phases.push(Phase::new("P2", "Phase Two"));

        epic.tasks.push(Task::new("K1", "P1", "Task One"));
        epic.task_mut("K1").unwrap().status = TaskStatus::Done;

        let mut t1 = Test::new("T1", "K1", "Test One");
        t1.set_status(TestStatus::Done);
        t1.test_result = Some(TestResult::Passing);
        epic.tests.push(t1);
        epic.tests.push(Test::new("T2", "K1", "Test Two"));
        epic
    }

    #[test]
    fn epic_completion_blocked_by_phase_and_test() {
        let result = validate_epic_completion(&blocked_epic());
        assert!(!result.is_valid);
        assert_eq!(result.pending_phases.len(), 1);
        assert_eq!(result.pending_phases[0].id, "P2");
        assert_eq!(result.failing_tests.len(), 1);
        assert_eq!(result.failing_tests[0].id, "T2");
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn epic_completion_message_format() {
        let result = validate_epic_completion(&blocked_epic());
        let message = result.message();
        assert!(message.starts_with("Cannot complete epic:"));
        assert!(message.contains("1 phase pending"));
        assert!(message.contains("1 test failing"));
        assert!(message.contains("Progress: phases 1/2, tasks 1/1, tests 1/2"));
        assert!(message.contains("Pending phases: P2 (Phase Two)"));
        assert!(message.contains("Failing tests: T2 (Test Two)"));
    }

    #[test]
    fn named_items_capped_with_ellipsis() {
        let mut epic = blocked_epic();
        for i in 3..8 {
            epic.phases
                .push(Phase::new(format!("P{i}"), format!("Phase {i}")));
        }
        let message = validate_epic_completion(&epic).message();
        assert!(message.contains("…"));
        assert!(!message.contains("P7 ("));
    }

    #[test]
    fn cancelled_test_does_not_block_epic() {
        let mut epic = blocked_epic();
        epic.phase_mut("P2").unwrap().status = PhaseStatus::Done;
        epic.test_mut("T2").unwrap().set_status(TestStatus::Cancelled);
        let result = validate_epic_completion(&epic);
        assert!(result.is_valid, "{}", result.message());
    }

    #[test]
    fn done_failing_test_blocks_epic() {
        let mut epic = blocked_epic();
        epic.phase_mut("P2").unwrap().status = PhaseStatus::Done;
        let t = epic.test_mut("T2").unwrap();
        t.set_status(TestStatus::Done);
        t.test_result = Some(TestResult::Failing);
        let result = validate_epic_completion(&epic);
        assert!(!result.is_valid);
        assert_eq!(result.failing_tests[0].id, "T2");
    }

    #[test]
    fn phase_completion_requires_terminal_tasks_and_tests() {
        let created = Utc.with_ymd_and_hms(2025, 8, 15, 9, 0, 0).unwrap();
        let mut epic = Epic::new("1", "X", created);
        epic.phases.push(Phase::new("P1", "One"));
        epic.tasks.push(Task::new("K1", "P1", "Task"));
        epic.tests.push(Test::new("T1", "K1", "Test"));

        let result = validate_phase_completion(&epic, "P1").unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.pending_tasks.len(), 1);
        assert_eq!(result.pending_tests.len(), 1);
        assert!(result.message().starts_with("Cannot complete phase P1:"));

        // Cancelled counts as resolved for phase scope.
        epic.task_mut("K1").unwrap().status = TaskStatus::Cancelled;
        epic.test_mut("T1").unwrap().set_status(TestStatus::Cancelled);
        let result = validate_phase_completion(&epic, "P1").unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn phase_completion_unknown_phase() {
        let created = Utc.with_ymd_and_hms(2025, 8, 15, 9, 0, 0).unwrap();
        let epic = Epic::new("1", "X", created);
        assert!(matches!(
            validate_phase_completion(&epic, "NOPE"),
            Err(AgentPmError::PhaseNotFound(_))
        ));
    }

    #[test]
    fn task_completion_requires_terminal_tests() {
        let created = Utc.with_ymd_and_hms(2025, 8, 15, 9, 0, 0).unwrap();
        let mut epic = Epic::new("1", "X", created);
        epic.phases.push(Phase::new("P1", "One"));
        epic.tasks.push(Task::new("K1", "P1", "Task"));
        epic.tests.push(Test::new("T1", "K1", "Test"));

        let result = validate_task_completion(&epic, "K1").unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.pending_tests.len(), 1);

        epic.test_mut("T1").unwrap().set_status(TestStatus::Done);
        let result = validate_task_completion(&epic, "K1").unwrap();
        assert!(result.is_valid);
    }
}
