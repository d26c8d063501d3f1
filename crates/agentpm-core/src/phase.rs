use crate::prose::Prose;
use crate::types::PhaseStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Prose::is_empty")]
    pub description: Prose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Phase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: PhaseStatus::Pending,
            description: Prose::default(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_phase_is_pending() {
        let p = Phase::new("1A", "Setup");
        assert_eq!(p.status, PhaseStatus::Pending);
        assert!(p.started_at.is_none());
        assert!(p.completed_at.is_none());
    }
}
