//! Command-level lifecycle operations. Every operation follows the same
//! shape: load the epic, check the transition table, run completion
//! validation where it applies, mutate, append the event, refresh the cached
//! current-state block, save. Refusals return before the mutation, so a
//! rejected request never changes the document and never logs an event.

use crate::epic::{CurrentState, Epic};
use crate::error::{AgentPmError, ConstraintKind, Result};
use crate::event::{self, Event};
use crate::query;
use crate::store::EpicStore;
use crate::types::{EntityKind, EpicStatus, PhaseStatus, TaskStatus, TestResult, TestStatus};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EpicRequest {
    pub epic_path: PathBuf,
    /// Caller-supplied time wins over the injected clock.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PhaseRequest {
    pub epic_path: PathBuf,
    pub phase_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub epic_path: PathBuf,
    pub task_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CancelTaskRequest {
    pub epic_path: PathBuf,
    pub task_id: String,
    pub reason: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TestRequest {
    pub epic_path: PathBuf,
    pub test_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FailTestRequest {
    pub epic_path: PathBuf,
    pub test_id: String,
    pub reason: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CancelTestRequest {
    pub epic_path: PathBuf,
    pub test_id: String,
    pub reason: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LogRequest {
    pub epic_path: PathBuf,
    pub message: String,
    pub event_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    pub entity: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogResult {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// LifecycleService
// ---------------------------------------------------------------------------

pub struct LifecycleService<S> {
    store: S,
    clock: Clock,
    agent: Option<String>,
}

impl<S: EpicStore> LifecycleService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Box::new(Utc::now),
            agent: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Identity stamped onto appended events, typically the config's
    /// default_assignee.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn now(&self, override_ts: Option<DateTime<Utc>>) -> DateTime<Utc> {
        override_ts.unwrap_or_else(|| (self.clock)())
    }

    fn stamp(&self, event: Event) -> Event {
        match &self.agent {
            Some(agent) => event.with_agent(agent.clone()),
            None => event,
        }
    }

    /// Mutation already applied: append the event, refresh the cached
    /// projection, and persist. Event append happens strictly after the state
    /// change and strictly before the save.
    fn finish(&self, epic: &mut Epic, path: &Path, event: Event) -> Result<()> {
        epic.append_event(self.stamp(event));
        refresh_current_state(epic);
        self.store.save_epic(epic, path)
    }

    // ---------------------------------------------------------------------------
    // Epic operations
    // ---------------------------------------------------------------------------

    pub fn start_epic(&self, req: &EpicRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);
        let from = epic.status;

        if !from.can_transition_to(EpicStatus::Wip) {
            return Err(refusal(
                EntityKind::Epic,
                &epic.id,
                from.as_str(),
                EpicStatus::Wip.as_str(),
                match from {
                    EpicStatus::Done => "The epic is already done".to_string(),
                    _ => "The epic is already started; check 'status' for current work".to_string(),
                },
            ));
        }

        epic.status = EpicStatus::Wip;
        let data = format!("Epic {} started", epic.name);
        self.finish(&mut epic, &req.epic_path, Event::new(event::EPIC_STARTED, data, ts))?;
        Ok(transition(
            EntityKind::Epic,
            &epic.id,
            &epic.name,
            from.as_str(),
            EpicStatus::Wip.as_str(),
            ts,
            event::EPIC_STARTED,
        ))
    }

    pub fn complete_epic(&self, req: &EpicRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);
        let from = epic.status;

        if !from.can_transition_to(EpicStatus::Done) {
            return Err(refusal(
                EntityKind::Epic,
                &epic.id,
                from.as_str(),
                EpicStatus::Done.as_str(),
                match from {
                    EpicStatus::Pending => "Start the epic first: start-epic".to_string(),
                    _ => "The epic is already done".to_string(),
                },
            ));
        }

        let result = validation::validate_epic_completion(&epic);
        if !result.is_valid {
            return Err(AgentPmError::CompletionBlocked { result });
        }

        epic.status = EpicStatus::Done;
        let data = format!("Epic {} completed", epic.name);
        self.finish(&mut epic, &req.epic_path, Event::new(event::EPIC_COMPLETED, data, ts))?;
        Ok(transition(
            EntityKind::Epic,
            &epic.id,
            &epic.name,
            from.as_str(),
            EpicStatus::Done.as_str(),
            ts,
            event::EPIC_COMPLETED,
        ))
    }

    // ---------------------------------------------------------------------------
    // Phase operations
    // ---------------------------------------------------------------------------

    pub fn start_phase(&self, req: &PhaseRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let phase = epic
            .phase(&req.phase_id)
            .ok_or_else(|| AgentPmError::PhaseNotFound(req.phase_id.clone()))?;
        let from = phase.status;
        let name = phase.name.clone();

        if epic.status != EpicStatus::Wip {
            return Err(AgentPmError::MissingPrerequisite {
                entity_id: req.phase_id.clone(),
                message: format!("epic {} has not been started", epic.id),
                suggestion: "start-epic".to_string(),
            });
        }

        if let Some(active) = epic.active_phase() {
            if active.id != req.phase_id {
                return Err(AgentPmError::ConstraintViolation {
                    kind: ConstraintKind::Phase,
                    active_id: active.id.clone(),
                    attempted_id: req.phase_id.clone(),
                });
            }
        }

        if !from.can_transition_to(PhaseStatus::Wip) {
            return Err(refusal(
                EntityKind::Phase,
                &req.phase_id,
                from.as_str(),
                PhaseStatus::Wip.as_str(),
                match from {
                    PhaseStatus::Done => "The phase is already done; start a pending phase".to_string(),
                    _ => format!("The phase is already active; complete it with: done-phase {}", req.phase_id),
                },
            ));
        }

        let phase = epic
            .phase_mut(&req.phase_id)
            .ok_or_else(|| AgentPmError::PhaseNotFound(req.phase_id.clone()))?;
        phase.status = PhaseStatus::Wip;
        phase.started_at = Some(ts);

        let data = format!("Phase {name} started");
        let ev = Event::new(event::PHASE_STARTED, data, ts).with_phase(req.phase_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Phase,
            &req.phase_id,
            &name,
            from.as_str(),
            PhaseStatus::Wip.as_str(),
            ts,
            event::PHASE_STARTED,
        ))
    }

    pub fn complete_phase(&self, req: &PhaseRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let phase = epic
            .phase(&req.phase_id)
            .ok_or_else(|| AgentPmError::PhaseNotFound(req.phase_id.clone()))?;
        let from = phase.status;
        let name = phase.name.clone();

        if !from.can_transition_to(PhaseStatus::Done) {
            return Err(refusal(
                EntityKind::Phase,
                &req.phase_id,
                from.as_str(),
                PhaseStatus::Done.as_str(),
                match from {
                    PhaseStatus::Pending => {
                        format!("Start the phase first: start-phase {}", req.phase_id)
                    }
                    _ => "The phase is already done".to_string(),
                },
            ));
        }

        let result = validation::validate_phase_completion(&epic, &req.phase_id)?;
        if !result.is_valid {
            return Err(AgentPmError::CompletionBlocked { result });
        }

        let phase = epic
            .phase_mut(&req.phase_id)
            .ok_or_else(|| AgentPmError::PhaseNotFound(req.phase_id.clone()))?;
        phase.status = PhaseStatus::Done;
        phase.completed_at = Some(ts);

        let data = format!("Phase {name} completed");
        let ev = Event::new(event::PHASE_COMPLETED, data, ts).with_phase(req.phase_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Phase,
            &req.phase_id,
            &name,
            from.as_str(),
            PhaseStatus::Done.as_str(),
            ts,
            event::PHASE_COMPLETED,
        ))
    }

    // ---------------------------------------------------------------------------
    // Task operations
    // ---------------------------------------------------------------------------

    pub fn start_task(&self, req: &TaskRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let task = epic
            .task(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        let from = task.status;
        let name = task.name.clone();
        let phase_id = task.phase_id.clone();

        // A wip task requires its phase to be the active one.
        let phase = epic
            .phase(&phase_id)
            .ok_or_else(|| AgentPmError::PhaseNotFound(phase_id.clone()))?;
        if phase.status != PhaseStatus::Wip {
            return Err(AgentPmError::MissingPrerequisite {
                entity_id: req.task_id.clone(),
                message: format!("phase {phase_id} is not active"),
                suggestion: format!("start-phase {phase_id}"),
            });
        }

        if let Some(active) = epic.active_task_in_phase(&phase_id) {
            if active.id != req.task_id {
                return Err(AgentPmError::ConstraintViolation {
                    kind: ConstraintKind::Task,
                    active_id: active.id.clone(),
                    attempted_id: req.task_id.clone(),
                });
            }
        }

        if !from.can_transition_to(TaskStatus::Wip) {
            return Err(refusal(
                EntityKind::Task,
                &req.task_id,
                from.as_str(),
                TaskStatus::Wip.as_str(),
                match from {
                    TaskStatus::Wip => {
                        format!("The task is already active; complete it with: done-task {}", req.task_id)
                    }
                    _ => "The task has already been resolved".to_string(),
                },
            ));
        }

        let task = epic
            .task_mut(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        task.status = TaskStatus::Wip;
        task.started_at = Some(ts);

        let data = format!("Task {name} started");
        let ev = Event::new(event::TASK_STARTED, data, ts)
            .with_phase(phase_id)
            .with_task(req.task_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Task,
            &req.task_id,
            &name,
            from.as_str(),
            TaskStatus::Wip.as_str(),
            ts,
            event::TASK_STARTED,
        ))
    }

    pub fn complete_task(&self, req: &TaskRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let task = epic
            .task(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        let from = task.status;
        let name = task.name.clone();
        let phase_id = task.phase_id.clone();

        if !from.can_transition_to(TaskStatus::Done) {
            return Err(refusal(
                EntityKind::Task,
                &req.task_id,
                from.as_str(),
                TaskStatus::Done.as_str(),
                match from {
                    TaskStatus::Pending => {
                        format!("Start the task first: start-task {}", req.task_id)
                    }
                    _ => "The task has already been resolved".to_string(),
                },
            ));
        }

        let result = validation::validate_task_completion(&epic, &req.task_id)?;
        if !result.is_valid {
            return Err(AgentPmError::CompletionBlocked { result });
        }

        let task = epic
            .task_mut(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        task.status = TaskStatus::Done;
        task.completed_at = Some(ts);

        let data = format!("Task {name} completed");
        let ev = Event::new(event::TASK_COMPLETED, data, ts)
            .with_phase(phase_id)
            .with_task(req.task_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Task,
            &req.task_id,
            &name,
            from.as_str(),
            TaskStatus::Done.as_str(),
            ts,
            event::TASK_COMPLETED,
        ))
    }

    pub fn cancel_task(&self, req: &CancelTaskRequest) -> Result<TransitionResult> {
        if req.reason.trim().is_empty() {
            return Err(AgentPmError::ReasonRequired(format!("task {}", req.task_id)));
        }

        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let task = epic
            .task(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        let from = task.status;
        let name = task.name.clone();
        let phase_id = task.phase_id.clone();

        if !from.can_transition_to(TaskStatus::Cancelled) {
            return Err(refusal(
                EntityKind::Task,
                &req.task_id,
                from.as_str(),
                TaskStatus::Cancelled.as_str(),
                "Only pending or active tasks can be cancelled".to_string(),
            ));
        }

        let task = epic
            .task_mut(&req.task_id)
            .ok_or_else(|| AgentPmError::TaskNotFound(req.task_id.clone()))?;
        task.status = TaskStatus::Cancelled;
        task.cancelled_at = Some(ts);
        task.cancellation_reason = Some(req.reason.clone());

        let data = format!("Task {name} cancelled: {}", req.reason);
        let ev = Event::new(event::TASK_CANCELLED, data, ts)
            .with_phase(phase_id)
            .with_task(req.task_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Task,
            &req.task_id,
            &name,
            from.as_str(),
            TaskStatus::Cancelled.as_str(),
            ts,
            event::TASK_CANCELLED,
        ))
    }

    // ---------------------------------------------------------------------------
    // Test operations
    // ---------------------------------------------------------------------------

    pub fn start_test(&self, req: &TestRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let test = epic
            .test(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        let from = test.test_status;
        let name = test.name.clone();

        if !from.can_transition_to(TestStatus::Wip) {
            return Err(refusal(
                EntityKind::Test,
                &req.test_id,
                from.as_str(),
                TestStatus::Wip.as_str(),
                match from {
                    TestStatus::Cancelled => "Cancelled tests cannot be restarted".to_string(),
                    _ => "The test is already running".to_string(),
                },
            ));
        }

        let test = epic
            .test_mut(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        test.set_status(TestStatus::Wip);
        test.started_at = Some(ts);
        let task_id = test.task_id.clone();

        let data = format!("Test {name} started");
        let ev = Event::new(event::TEST_STARTED, data, ts)
            .with_task(task_id)
            .with_test(req.test_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Test,
            &req.test_id,
            &name,
            from.as_str(),
            TestStatus::Wip.as_str(),
            ts,
            event::TEST_STARTED,
        ))
    }

    pub fn pass_test(&self, req: &TestRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let test = epic
            .test(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        let from = test.test_status;
        let name = test.name.clone();

        if !from.can_transition_to(TestStatus::Done) {
            return Err(refusal(
                EntityKind::Test,
                &req.test_id,
                from.as_str(),
                TestStatus::Done.as_str(),
                match from {
                    TestStatus::Pending => {
                        format!("Start the test first: start-test {}", req.test_id)
                    }
                    TestStatus::Done => "The test is already done".to_string(),
                    _ => "Cancelled tests cannot pass".to_string(),
                },
            ));
        }

        let test = epic
            .test_mut(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        test.set_status(TestStatus::Done);
        test.test_result = Some(TestResult::Passing);
        test.passed_at = Some(ts);
        let task_id = test.task_id.clone();

        let data = format!("Test {name} passed");
        let ev = Event::new(event::TEST_PASSED, data, ts)
            .with_task(task_id)
            .with_test(req.test_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Test,
            &req.test_id,
            &name,
            from.as_str(),
            TestStatus::Done.as_str(),
            ts,
            event::TEST_PASSED,
        ))
    }

    /// Mark a test failing. The unified status moves (back) to wip — the
    /// documented reopen exception — the result flips to failing, and the
    /// reason lands in failure_note. Appends both the `test_failed` event and
    /// an automatic `blocker` event at the same timestamp.
    pub fn fail_test(&self, req: &FailTestRequest) -> Result<TransitionResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let test = epic
            .test(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        let from = test.test_status;
        let name = test.name.clone();

        if from != TestStatus::Wip && !from.can_transition_to(TestStatus::Wip) {
            return Err(refusal(
                EntityKind::Test,
                &req.test_id,
                from.as_str(),
                TestStatus::Wip.as_str(),
                "Cancelled tests cannot fail".to_string(),
            ));
        }

        let test = epic
            .test_mut(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        test.set_status(TestStatus::Wip);
        test.test_result = Some(TestResult::Failing);
        test.failed_at = Some(ts);
        if !req.reason.trim().is_empty() {
            test.failure_note = Some(req.reason.clone());
        }
        let task_id = test.task_id.clone();

        let data = if req.reason.trim().is_empty() {
            format!("Test {name} failed")
        } else {
            format!("Test {name} failed: {}", req.reason)
        };
        epic.append_event(self.stamp(
            Event::new(event::TEST_FAILED, data, ts)
                .with_task(task_id.clone())
                .with_test(req.test_id.clone()),
        ));

        let blocker = format!("Failing test {name} blocks task {task_id}");
        let ev = Event::new(event::BLOCKER, blocker, ts)
            .with_task(task_id)
            .with_test(req.test_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Test,
            &req.test_id,
            &name,
            from.as_str(),
            TestStatus::Wip.as_str(),
            ts,
            event::TEST_FAILED,
        ))
    }

    pub fn cancel_test(&self, req: &CancelTestRequest) -> Result<TransitionResult> {
        if req.reason.trim().is_empty() {
            return Err(AgentPmError::ReasonRequired(format!("test {}", req.test_id)));
        }

        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);

        let test = epic
            .test(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        let from = test.test_status;
        let name = test.name.clone();

        if !from.can_transition_to(TestStatus::Cancelled) {
            return Err(refusal(
                EntityKind::Test,
                &req.test_id,
                from.as_str(),
                TestStatus::Cancelled.as_str(),
                match from {
                    TestStatus::Done => {
                        "Done tests cannot be cancelled; fail and reopen instead".to_string()
                    }
                    _ => "The test has already been cancelled".to_string(),
                },
            ));
        }

        let test = epic
            .test_mut(&req.test_id)
            .ok_or_else(|| AgentPmError::TestNotFound(req.test_id.clone()))?;
        test.set_status(TestStatus::Cancelled);
        test.cancelled_at = Some(ts);
        test.cancellation_reason = Some(req.reason.clone());
        let task_id = test.task_id.clone();

        let data = format!("Test {name} cancelled: {}", req.reason);
        let ev = Event::new(event::TEST_CANCELLED, data, ts)
            .with_task(task_id)
            .with_test(req.test_id.clone());
        self.finish(&mut epic, &req.epic_path, ev)?;
        Ok(transition(
            EntityKind::Test,
            &req.test_id,
            &name,
            from.as_str(),
            TestStatus::Cancelled.as_str(),
            ts,
            event::TEST_CANCELLED,
        ))
    }

    // ---------------------------------------------------------------------------
    // Manual activity log
    // ---------------------------------------------------------------------------

    pub fn log(&self, req: &LogRequest) -> Result<LogResult> {
        let mut epic = self.store.load_epic(&req.epic_path)?;
        let ts = self.now(req.timestamp);
        let event_type = req
            .event_type
            .clone()
            .unwrap_or_else(|| event::IMPLEMENTATION.to_string());

        let ev = self.stamp(Event::new(event_type.clone(), req.message.clone(), ts));
        let event_id = ev.id.clone();
        epic.append_event(ev);
        self.store.save_epic(&epic, &req.epic_path)?;
        Ok(LogResult {
            event_id,
            event_type,
            timestamp: ts,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn refusal(
    kind: EntityKind,
    id: &str,
    current: &str,
    target: &str,
    suggestion: String,
) -> AgentPmError {
    AgentPmError::TransitionRefused {
        entity_id: id.to_string(),
        current_status: current.to_string(),
        target_status: target.to_string(),
        message: format!("cannot transition {kind} {id} from {current} to {target}"),
        suggestion,
    }
}

fn transition(
    entity: EntityKind,
    id: &str,
    name: &str,
    from: &str,
    to: &str,
    timestamp: DateTime<Utc>,
    event_type: &str,
) -> TransitionResult {
    TransitionResult {
        entity,
        entity_id: id.to_string(),
        entity_name: name.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        timestamp,
        event_type: event_type.to_string(),
    }
}

fn refresh_current_state(epic: &mut Epic) {
    epic.current_state = Some(CurrentState {
        active_phase: query::active_phase_id(epic),
        active_task: epic.active_task().map(|t| t.id.clone()),
        next_action: Some(query::next_action(epic)),
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
