use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EpicStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    #[default]
    Pending,
    Wip,
    Done,
}

impl EpicStatus {
    pub fn all() -> &'static [EpicStatus] {
        &[EpicStatus::Pending, EpicStatus::Wip, EpicStatus::Done]
    }

    pub fn can_transition_to(self, target: EpicStatus) -> bool {
        matches!(
            (self, target),
            (EpicStatus::Pending, EpicStatus::Wip) | (EpicStatus::Wip, EpicStatus::Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EpicStatus::Pending => "pending",
            EpicStatus::Wip => "wip",
            EpicStatus::Done => "done",
        }
    }

    /// Codec-boundary mapping. Accepts the legacy vocabulary and degrades
    /// unrecognized tokens to Pending; never fails a load.
    pub fn lenient(token: &str) -> EpicStatus {
        match token {
            "wip" | "active" => EpicStatus::Wip,
            "done" | "completed" => EpicStatus::Done,
            _ => EpicStatus::Pending,
        }
    }
}

impl fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EpicStatus {
    type Err = crate::error::AgentPmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EpicStatus::Pending),
            "wip" => Ok(EpicStatus::Wip),
            "done" => Ok(EpicStatus::Done),
            _ => Err(crate::error::AgentPmError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Wip,
    Done,
}

impl PhaseStatus {
    pub fn all() -> &'static [PhaseStatus] {
        &[PhaseStatus::Pending, PhaseStatus::Wip, PhaseStatus::Done]
    }

    pub fn can_transition_to(self, target: PhaseStatus) -> bool {
        matches!(
            (self, target),
            (PhaseStatus::Pending, PhaseStatus::Wip) | (PhaseStatus::Wip, PhaseStatus::Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Wip => "wip",
            PhaseStatus::Done => "done",
        }
    }

    pub fn lenient(token: &str) -> PhaseStatus {
        match token {
            "wip" | "active" => PhaseStatus::Wip,
            "done" | "completed" => PhaseStatus::Done,
            _ => PhaseStatus::Pending,
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = crate::error::AgentPmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhaseStatus::Pending),
            "wip" => Ok(PhaseStatus::Wip),
            "done" => Ok(PhaseStatus::Done),
            _ => Err(crate::error::AgentPmError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// The legacy `on_hold` token parses as Pending; the unified set is what gets
/// written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Wip,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn all() -> &'static [TaskStatus] {
        &[
            TaskStatus::Pending,
            TaskStatus::Wip,
            TaskStatus::Done,
            TaskStatus::Cancelled,
        ]
    }

    pub fn can_transition_to(self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Pending, TaskStatus::Wip)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Wip, TaskStatus::Done)
                | (TaskStatus::Wip, TaskStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Wip => "wip",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn lenient(token: &str) -> TaskStatus {
        match token {
            "wip" | "active" => TaskStatus::Wip,
            "done" | "completed" => TaskStatus::Done,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::error::AgentPmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "wip" => Ok(TaskStatus::Wip),
            "done" => Ok(TaskStatus::Done),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(crate::error::AgentPmError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TestStatus
// ---------------------------------------------------------------------------

/// Same table as TaskStatus plus the one documented exception: Done → Wip,
/// so a completed-but-failing test can be reopened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Pending,
    Wip,
    Done,
    Cancelled,
}

impl TestStatus {
    pub fn all() -> &'static [TestStatus] {
        &[
            TestStatus::Pending,
            TestStatus::Wip,
            TestStatus::Done,
            TestStatus::Cancelled,
        ]
    }

    pub fn can_transition_to(self, target: TestStatus) -> bool {
        matches!(
            (self, target),
            (TestStatus::Pending, TestStatus::Wip)
                | (TestStatus::Pending, TestStatus::Cancelled)
                | (TestStatus::Wip, TestStatus::Done)
                | (TestStatus::Wip, TestStatus::Cancelled)
                | (TestStatus::Done, TestStatus::Wip)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TestStatus::Done | TestStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Wip => "wip",
            TestStatus::Done => "done",
            TestStatus::Cancelled => "cancelled",
        }
    }

    pub fn lenient(token: &str) -> TestStatus {
        match token {
            "wip" | "active" => TestStatus::Wip,
            "done" | "completed" => TestStatus::Done,
            "cancelled" => TestStatus::Cancelled,
            _ => TestStatus::Pending,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestStatus {
    type Err = crate::error::AgentPmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TestStatus::Pending),
            "wip" => Ok(TestStatus::Wip),
            "done" => Ok(TestStatus::Done),
            "cancelled" => Ok(TestStatus::Cancelled),
            _ => Err(crate::error::AgentPmError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TestResult
// ---------------------------------------------------------------------------

/// Independent of TestStatus — a Done test can still be Failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Passing,
    Failing,
}

impl TestResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TestResult::Passing => "passing",
            TestResult::Failing => "failing",
        }
    }

    pub fn lenient(token: &str) -> Option<TestResult> {
        match token {
            "passing" | "passed" => Some(TestResult::Passing),
            "failing" | "failed" => Some(TestResult::Failing),
            _ => None,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Epic,
    Phase,
    Task,
    Test,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Epic => "epic",
            EntityKind::Phase => "phase",
            EntityKind::Task => "task",
            EntityKind::Test => "test",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = crate::error::AgentPmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "epic" => Ok(EntityKind::Epic),
            "phase" => Ok(EntityKind::Phase),
            "task" => Ok(EntityKind::Task),
            "test" => Ok(EntityKind::Test),
            _ => Err(crate::error::AgentPmError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
