//! ContentBlock: the smallest addressable unit of generated content
//! (spec.md §3, §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use texloom_store::{now_ms, IndexValue, Record};

use super::id::generate_id;
use super::qc::QCReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Definition,
    Intuition,
    ProofSkeleton,
    Exercise,
    Text,
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Definition => "definition",
            Self::Intuition => "intuition",
            Self::ProofSkeleton => "proof_skeleton",
            Self::Exercise => "exercise",
            Self::Text => "text",
        };
        write!(f, "{s}")
    }
}

/// Block FSM states (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    PendingGeneration,
    GenerationInProgress,
    GenerationFailed,
    QcPending,
    QcInProgress,
    QcPassed,
    QcFailed,
    RefinementPending,
    RefinementInProgress,
    RefinementFailed,
    PendingValidation,
    Validated,
    Archived,
    CriticalError,
}

impl std::fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingGeneration => "pending_generation",
            Self::GenerationInProgress => "generation_in_progress",
            Self::GenerationFailed => "generation_failed",
            Self::QcPending => "qc_pending",
            Self::QcInProgress => "qc_in_progress",
            Self::QcPassed => "qc_passed",
            Self::QcFailed => "qc_failed",
            Self::RefinementPending => "refinement_pending",
            Self::RefinementInProgress => "refinement_in_progress",
            Self::RefinementFailed => "refinement_failed",
            Self::PendingValidation => "pending_validation",
            Self::Validated => "validated",
            Self::Archived => "archived",
            Self::CriticalError => "critical_error",
        };
        write!(f, "{s}")
    }
}

impl BlockStatus {
    /// Terminal states: no further transition except `archive`
    /// (GLOSSARY). `critical_error` stops the block outright.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BlockStatus::Validated | BlockStatus::RefinementFailed | BlockStatus::CriticalError
        )
    }

    /// qc_report must be non-null iff status is one of these (spec.md §3 invariant).
    pub fn requires_qc_report(&self) -> bool {
        matches!(
            self,
            BlockStatus::QcPassed | BlockStatus::QcFailed | BlockStatus::RefinementPending
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub version_id: String,
    pub slot_id: String,
    pub block_type: BlockType,
    pub content: String,
    pub source_llm: Option<String>,
    pub generation_params: serde_json::Value,
    pub qc_report: Option<QCReport>,
    pub status: BlockStatus,
    pub refinement_attempts: u32,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContentBlock {
    pub fn new(version_id: impl Into<String>, slot_id: impl Into<String>, block_type: BlockType) -> Self {
        let slot_id = slot_id.into();
        let now = now_ms();
        Self {
            id: generate_id("block", &slot_id),
            version_id: version_id.into(),
            slot_id,
            block_type,
            content: String::new(),
            source_llm: None,
            generation_params: serde_json::Value::Null,
            qc_report: None,
            status: BlockStatus::PendingGeneration,
            refinement_attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the successor block for a refinement attempt: same structural
    /// slot, incremented attempt counter, fresh content pending
    /// regeneration (spec.md §9 open question — new block per attempt).
    pub fn next_refinement(&self) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("block", &self.slot_id),
            version_id: self.version_id.clone(),
            slot_id: self.slot_id.clone(),
            block_type: self.block_type,
            content: String::new(),
            source_llm: None,
            generation_params: self.generation_params.clone(),
            qc_report: None,
            status: BlockStatus::PendingGeneration,
            refinement_attempts: self.refinement_attempts + 1,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for ContentBlock {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "blocks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("version_id".into(), IndexValue::String(self.version_id.clone()));
        fields.insert("slot_id".into(), IndexValue::String(self.slot_id.clone()));
        fields.insert("status".into(), IndexValue::String(self.status.to_string()));
        fields
    }
}
