use crate::validation::ValidationResult;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConstraintKind
// ---------------------------------------------------------------------------

/// Which single-active-entity rule a refused start operation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Phase,
    Task,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Phase => "phase",
            ConstraintKind::Task => "task",
        }
    }
}

// ---------------------------------------------------------------------------
// AgentPmError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AgentPmError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("epic file not found: {0}")]
    EpicNotFound(PathBuf),

    #[error("malformed config {path}: {source}")]
    MalformedConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("malformed XML in {path}: {message}")]
    MalformedXml { path: PathBuf, message: String },

    #[error("not an epic document: root element must be <epic>")]
    MissingEpicRoot,

    #[error("invalid epic document: {0}")]
    XmlStructure(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("test not found: {0}")]
    TestNotFound(String),

    #[error("no epic loaded")]
    NoEpicLoaded,

    /// The per-entity transition table does not allow current → target.
    #[error("{message}")]
    TransitionRefused {
        entity_id: String,
        current_status: String,
        target_status: String,
        message: String,
        suggestion: String,
    },

    /// A completion was attempted while one or more invariants still fail.
    #[error("{}", .result.message())]
    CompletionBlocked { result: ValidationResult },

    /// Starting a second active phase, or a second active task in one phase.
    #[error("cannot start {kind} {attempted_id}: {kind} {active_id} is already active", kind = .kind.as_str())]
    ConstraintViolation {
        kind: ConstraintKind,
        active_id: String,
        attempted_id: String,
    },

    /// The operation needs some other entity to be active first.
    #[error("{message}")]
    MissingPrerequisite {
        entity_id: String,
        message: String,
        suggestion: String,
    },

    #[error("a non-empty reason is required to cancel {0}")]
    ReasonRequired(String),

    #[error("invalid status token: {0}")]
    InvalidStatus(String),

    #[error("invalid timestamp '{0}': expected RFC-3339")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid attribute syntax: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid escape sequence: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
}

impl AgentPmError {
    /// Stable key used by hint overrides and structured error output.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentPmError::ConfigNotFound(_) => "config_not_found",
            AgentPmError::EpicNotFound(_) => "epic_not_found",
            AgentPmError::MalformedConfig { .. } => "malformed_config",
            AgentPmError::MalformedXml { .. } => "malformed_xml",
            AgentPmError::MissingEpicRoot => "missing_epic_root",
            AgentPmError::InvalidConfig(_) => "invalid_config",
            AgentPmError::PhaseNotFound(_) => "phase_not_found",
            AgentPmError::TaskNotFound(_) => "task_not_found",
            AgentPmError::TestNotFound(_) => "test_not_found",
            AgentPmError::NoEpicLoaded => "no_epic_loaded",
            AgentPmError::TransitionRefused { .. } => "transition_refused",
            AgentPmError::CompletionBlocked { .. } => "completion_blocked",
            AgentPmError::ConstraintViolation {
                kind: ConstraintKind::Phase,
                ..
            } => "phase_constraint",
            AgentPmError::ConstraintViolation {
                kind: ConstraintKind::Task,
                ..
            } => "task_constraint",
            AgentPmError::MissingPrerequisite { .. } => "missing_prerequisite",
            AgentPmError::ReasonRequired(_) => "reason_required",
            AgentPmError::InvalidStatus(_) => "invalid_status",
            AgentPmError::InvalidTimestamp(_) => "invalid_timestamp",
            AgentPmError::Io(_) => "io",
            AgentPmError::Json(_) => "json",
            AgentPmError::Xml(_)
            | AgentPmError::Attr(_)
            | AgentPmError::Escape(_)
            | AgentPmError::XmlStructure(_) => "xml",
        }
    }

    /// The short remediation string carried by refusal errors, if any.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            AgentPmError::TransitionRefused { suggestion, .. }
            | AgentPmError::MissingPrerequisite { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentPmError>;
