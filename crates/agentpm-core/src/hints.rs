//! Remediation hints for refused operations. A registry of ordered, pure
//! generators — fn pointers over an error context, no heap of trait objects —
//! answers with the first applicable hint that clears the configured minimum
//! priority. All state lives in the configuration.

use crate::epic::Epic;
use crate::error::{AgentPmError, ConstraintKind};
use serde::Serialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Hint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintCategory {
    Actionable,
    Informational,
    Workflow,
    Configuration,
}

// Variant order gives Low < Medium < High for the min-priority filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hint {
    pub content: String,
    pub category: HintCategory,
    pub priority: HintPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Context & generators
// ---------------------------------------------------------------------------

/// What a generator may look at. The epic is optional — hints degrade
/// gracefully when the document could not be loaded.
pub struct HintContext<'a> {
    pub error: &'a AgentPmError,
    pub epic: Option<&'a Epic>,
}

/// Pure fn-pointer generator; the registry consults them in order.
pub struct HintGenerator {
    pub id: &'static str,
    pub applies: fn(&HintContext) -> bool,
    pub generate: fn(&HintContext) -> Hint,
}

fn phase_constraint_applies(ctx: &HintContext) -> bool {
    matches!(
        ctx.error,
        AgentPmError::ConstraintViolation {
            kind: ConstraintKind::Phase,
            ..
        }
    )
}

fn phase_constraint_generate(ctx: &HintContext) -> Hint {
    let (active, attempted) = match ctx.error {
        AgentPmError::ConstraintViolation {
            active_id,
            attempted_id,
            ..
        } => (active_id.as_str(), attempted_id.as_str()),
        _ => ("", ""),
    };
    Hint {
        content: format!(
            "Phase {active} is still active. Complete it before starting {attempted}."
        ),
        category: HintCategory::Actionable,
        priority: HintPriority::High,
        suggested_command: Some(format!("done-phase {active}")),
        reference: None,
        conditions: vec!["another phase is active".to_string()],
    }
}

fn task_constraint_applies(ctx: &HintContext) -> bool {
    matches!(
        ctx.error,
        AgentPmError::ConstraintViolation {
            kind: ConstraintKind::Task,
            ..
        }
    )
}

fn task_constraint_generate(ctx: &HintContext) -> Hint {
    let (active, attempted) = match ctx.error {
        AgentPmError::ConstraintViolation {
            active_id,
            attempted_id,
            ..
        } => (active_id.as_str(), attempted_id.as_str()),
        _ => ("", ""),
    };
    Hint {
        content: format!(
            "Task {active} is still active in this phase. Complete or cancel it before starting {attempted}."
        ),
        category: HintCategory::Actionable,
        priority: HintPriority::High,
        suggested_command: Some(format!("done-task {active}")),
        reference: None,
        conditions: vec!["another task is active in the same phase".to_string()],
    }
}

fn missing_prerequisite_applies(ctx: &HintContext) -> bool {
    matches!(ctx.error, AgentPmError::MissingPrerequisite { .. })
}

fn missing_prerequisite_generate(ctx: &HintContext) -> Hint {
    let (message, suggestion) = match ctx.error {
        AgentPmError::MissingPrerequisite {
            message,
            suggestion,
            ..
        } => (message.clone(), suggestion.clone()),
        _ => (String::new(), String::new()),
    };
    Hint {
        content: format!("A prerequisite is missing: {message}."),
        category: HintCategory::Actionable,
        priority: HintPriority::High,
        suggested_command: Some(suggestion),
        reference: None,
        conditions: vec!["prerequisite entity is not active".to_string()],
    }
}

fn completion_blocked_applies(ctx: &HintContext) -> bool {
    // Epic-aware guidance: name the concrete blocker out of the document.
    matches!(ctx.error, AgentPmError::CompletionBlocked { .. }) && ctx.epic.is_some()
}

fn completion_blocked_generate(ctx: &HintContext) -> Hint {
    let result = match ctx.error {
        AgentPmError::CompletionBlocked { result } => result,
        _ => unreachable!("guarded by applies"),
    };
    if let Some(phase) = result.pending_phases.first() {
        return Hint {
            content: format!(
                "Phase {} ({}) is still {} — the epic cannot close over it.",
                phase.id,
                phase.name,
                ctx.epic
                    .and_then(|e| e.phase(&phase.id))
                    .map(|p| p.status.as_str())
                    .unwrap_or("pending"),
            ),
            category: HintCategory::Workflow,
            priority: HintPriority::High,
            suggested_command: Some(format!("done-phase {}", phase.id)),
            reference: None,
            conditions: vec!["a phase is not done".to_string()],
        };
    }
    if let Some(task) = result.pending_tasks.first() {
        return Hint {
            content: format!("Task {} ({}) is still open.", task.id, task.name),
            category: HintCategory::Workflow,
            priority: HintPriority::High,
            suggested_command: Some(format!("done-task {}", task.id)),
            reference: None,
            conditions: vec!["a task is not done".to_string()],
        };
    }
    if let Some(test) = result
        .failing_tests
        .first()
        .map(|t| (t.id.clone(), t.name.clone()))
        .or_else(|| {
            result
                .pending_tests
                .first()
                .map(|t| (t.id.clone(), t.name.clone()))
        })
    {
        return Hint {
            content: format!(
                "Test {} ({}) has not passed; fix it or cancel it with a reason.",
                test.0, test.1
            ),
            category: HintCategory::Workflow,
            priority: HintPriority::High,
            suggested_command: Some(format!("pass-test {}", test.0)),
            reference: None,
            conditions: vec!["a test is unresolved".to_string()],
        };
    }
    workflow_fallback_generate(ctx)
}

fn invalid_transition_applies(ctx: &HintContext) -> bool {
    matches!(ctx.error, AgentPmError::TransitionRefused { .. })
}

fn invalid_transition_generate(ctx: &HintContext) -> Hint {
    let (current, target, suggestion) = match ctx.error {
        AgentPmError::TransitionRefused {
            current_status,
            target_status,
            suggestion,
            ..
        } => (
            current_status.clone(),
            target_status.clone(),
            suggestion.clone(),
        ),
        _ => (String::new(), String::new(), String::new()),
    };
    Hint {
        content: format!("The {current} → {target} transition is not allowed. {suggestion}"),
        category: HintCategory::Informational,
        priority: HintPriority::Medium,
        suggested_command: None,
        reference: None,
        conditions: vec!["transition table refused the move".to_string()],
    }
}

fn config_applies(ctx: &HintContext) -> bool {
    matches!(
        ctx.error,
        AgentPmError::ConfigNotFound(_)
            | AgentPmError::MalformedConfig { .. }
            | AgentPmError::InvalidConfig(_)
    )
}

fn config_generate(_ctx: &HintContext) -> Hint {
    Hint {
        content: "The tracker configuration is missing or invalid.".to_string(),
        category: HintCategory::Configuration,
        priority: HintPriority::Medium,
        suggested_command: Some("init --epic <path>".to_string()),
        reference: Some(".agentpm.json".to_string()),
        conditions: vec!["config could not be loaded".to_string()],
    }
}

fn workflow_fallback_applies(_ctx: &HintContext) -> bool {
    true
}

fn workflow_fallback_generate(_ctx: &HintContext) -> Hint {
    Hint {
        content: "Check where work stands before retrying.".to_string(),
        category: HintCategory::Workflow,
        priority: HintPriority::Low,
        suggested_command: Some("status".to_string()),
        reference: None,
        conditions: Vec::new(),
    }
}

pub fn default_generators() -> Vec<HintGenerator> {
    vec![
        HintGenerator {
            id: "phase_constraint",
            applies: phase_constraint_applies,
            generate: phase_constraint_generate,
        },
        HintGenerator {
            id: "task_constraint",
            applies: task_constraint_applies,
            generate: task_constraint_generate,
        },
        HintGenerator {
            id: "missing_prerequisite",
            applies: missing_prerequisite_applies,
            generate: missing_prerequisite_generate,
        },
        HintGenerator {
            id: "completion_blocked",
            applies: completion_blocked_applies,
            generate: completion_blocked_generate,
        },
        HintGenerator {
            id: "invalid_transition",
            applies: invalid_transition_applies,
            generate: invalid_transition_generate,
        },
        HintGenerator {
            id: "configuration",
            applies: config_applies,
            generate: config_generate,
        },
        HintGenerator {
            id: "workflow_fallback",
            applies: workflow_fallback_applies,
            generate: workflow_fallback_generate,
        },
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HintConfig {
    pub enabled: bool,
    pub min_priority: HintPriority,
    pub max_hints: usize,
    pub show_commands: bool,
    pub show_references: bool,
    /// Content overrides keyed by error kind (see `AgentPmError::kind`).
    pub overrides: HashMap<String, String>,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_priority: HintPriority::Low,
            max_hints: 3,
            show_commands: true,
            show_references: true,
            overrides: HashMap::new(),
        }
    }
}

pub struct HintRegistry {
    generators: Vec<HintGenerator>,
    config: HintConfig,
}

impl Default for HintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HintRegistry {
    pub fn new() -> Self {
        Self {
            generators: default_generators(),
            config: HintConfig::default(),
        }
    }

    pub fn with_config(config: HintConfig) -> Self {
        Self {
            generators: default_generators(),
            config,
        }
    }

    /// Extra generators are consulted before the built-ins.
    pub fn register(&mut self, generator: HintGenerator) {
        self.generators.insert(0, generator);
    }

    /// First applicable hint meeting the configured minimum priority.
    pub fn hint_for(&self, ctx: &HintContext) -> Option<Hint> {
        self.hints_for(ctx).into_iter().next()
    }

    /// All applicable hints (capped), priority filter applied per generator.
    pub fn hints_for(&self, ctx: &HintContext) -> Vec<Hint> {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut out = Vec::new();
        for generator in &self.generators {
            if out.len() >= self.config.max_hints {
                break;
            }
            if !(generator.applies)(ctx) {
                continue;
            }
            let mut hint = (generator.generate)(ctx);
            if hint.priority < self.config.min_priority {
                continue;
            }
            if let Some(content) = self.config.overrides.get(ctx.error.kind()) {
                hint.content = content.clone();
            }
            if !self.config.show_commands {
                hint.suggested_command = None;
            }
            if !self.config.show_references {
                hint.reference = None;
            }
            out.push(hint);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
