//! Project: the top-level unit a client submits (spec.md §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use texloom_store::{now_ms, IndexValue, Record};

use super::id::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMode {
    Supervised,
    Autonomous,
}

impl std::fmt::Display for ProjectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supervised => write!(f, "supervised"),
            Self::Autonomous => write!(f, "autonomous"),
        }
    }
}

/// Project lifecycle status. Terminal states are `completed_exported` and
/// `cancelled` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    InProgress,
    NeedsManualReview,
    ExportPending,
    ExportFailed,
    Completed,
    CompletedExported,
    Cancelled,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::NeedsManualReview => "needs_manual_review",
            Self::ExportPending => "export_pending",
            Self::ExportFailed => "export_failed",
            Self::Completed => "completed",
            Self::CompletedExported => "completed_exported",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::CompletedExported | ProjectStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub style: String,
    pub mode: ProjectMode,
    pub status: ProjectStatus,
    /// Opaque marker of where the project currently sits in its pipeline
    /// (e.g. the id of the version being worked).
    pub current_step: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn new(
        owner: impl Into<String>,
        title: impl Into<String>,
        subject: impl Into<String>,
        level: impl Into<String>,
        style: impl Into<String>,
        mode: ProjectMode,
    ) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("project", &title),
            owner: owner.into(),
            title,
            subject: subject.into(),
            level: level.into(),
            style: style.into(),
            mode,
            status: ProjectStatus::Draft,
            current_step: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ProjectStatus::Cancelled
    }
}

impl Record for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "projects"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner".into(), IndexValue::String(self.owner.clone()));
        fields.insert("status".into(), IndexValue::String(self.status.to_string()));
        fields.insert("mode".into(), IndexValue::String(self.mode.to_string()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_starts_in_draft() {
        let p = Project::new("alice", "Topology 101", "topology", "undergrad", "terse", ProjectMode::Autonomous);
        assert_eq!(p.status, ProjectStatus::Draft);
        assert!(p.id.contains("-project-"));
    }

    #[test]
    fn terminal_states() {
        assert!(ProjectStatus::CompletedExported.is_terminal());
        assert!(ProjectStatus::Cancelled.is_terminal());
        assert!(!ProjectStatus::InProgress.is_terminal());
    }
}
