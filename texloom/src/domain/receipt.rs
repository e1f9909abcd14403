//! IntakeReceipt: the dedupe record backing Intake's idempotency guarantee
//! (spec.md §4.6 — both `submit_user_signal` and `submit_task_result` are
//! idempotent on `(source, source_id)`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use texloom_store::{now_ms, IndexValue, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptOutcome {
    Applied,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeReceipt {
    /// `{source}:{source_id}`, e.g. `user_signal:client-123` or `task_completion:task-abc`.
    pub id: String,
    pub outcome: ReceiptOutcome,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl IntakeReceipt {
    pub fn new(dedup_key: impl Into<String>, outcome: ReceiptOutcome, detail: Option<String>) -> Self {
        Self {
            id: dedup_key.into(),
            outcome,
            detail,
            created_at: now_ms(),
        }
    }

    pub fn key(source: &str, source_id: &str) -> String {
        format!("{source}:{source_id}")
    }
}

impl Record for IntakeReceipt {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "intake_receipts"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_joins_source_and_id() {
        assert_eq!(IntakeReceipt::key("task_completion", "t1"), "task_completion:t1");
    }
}
