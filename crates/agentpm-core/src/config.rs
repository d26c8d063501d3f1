use crate::error::{AgentPmError, Result};
use crate::io;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".agentpm.json";
pub const DEFAULT_ASSIGNEE: &str = "agent";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The `.agentpm.json` file: which epic the agent is working, and under what
/// identity. The `previous_epic` slot is only ever written by switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub current_epic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_epic: Option<String>,
}

impl Config {
    pub fn new(current_epic: impl Into<String>) -> Self {
        Self {
            current_epic: current_epic.into(),
            project_name: None,
            default_assignee: Some(DEFAULT_ASSIGNEE.to_string()),
            previous_epic: None,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgentPmError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|source| AgentPmError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        io::atomic_write(path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------------

    /// Enforce required fields and fill defaults in place.
    pub fn validate(&mut self) -> Result<Vec<ConfigWarning>> {
        if self.current_epic.trim().is_empty() {
            return Err(AgentPmError::InvalidConfig(
                "current_epic must not be empty".to_string(),
            ));
        }
        let mut warnings = Vec::new();
        if self.default_assignee.as_deref().unwrap_or("").is_empty() {
            self.default_assignee = Some(DEFAULT_ASSIGNEE.to_string());
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("default_assignee missing, using '{DEFAULT_ASSIGNEE}'"),
            });
        }
        Ok(warnings)
    }

    pub fn assignee(&self) -> &str {
        self.default_assignee.as_deref().unwrap_or(DEFAULT_ASSIGNEE)
    }

    /// Absolute paths pass through; relative ones get an explicit `./`.
    pub fn epic_file_path(&self) -> PathBuf {
        let raw = Path::new(&self.current_epic);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            Path::new(".").join(raw)
        }
    }

    // ---------------------------------------------------------------------------
    // Epic rotation
    // ---------------------------------------------------------------------------

    pub fn switch(&mut self, new_epic: impl Into<String>) {
        let old = std::mem::replace(&mut self.current_epic, new_epic.into());
        self.previous_epic = Some(old);
    }

    pub fn switch_back(&mut self) -> Result<()> {
        let previous = self.previous_epic.take().ok_or_else(|| {
            AgentPmError::InvalidConfig("no previous_epic to switch back to".to_string())
        })?;
        let old = std::mem::replace(&mut self.current_epic, previous);
        self.previous_epic = Some(old);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
