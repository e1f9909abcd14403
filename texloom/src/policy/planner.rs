//! Autonomous planner (spec.md §4.6): picks the next structural slot to
//! generate from a version's content_structure.

use std::collections::HashMap;

use crate::domain::{BlockStatus, ContentStructure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerOutcome {
    /// Generate the block occupying this slot next.
    Next { slot_id: String, block_id: String },
    /// Every slot is in a terminal state.
    Complete,
}

/// Walk `structure` in document order and return the first slot whose
/// block is not in a terminal state. `block_status` must contain an entry
/// for every block_id referenced by the structure.
pub fn plan_next(structure: &ContentStructure, block_status: &HashMap<String, BlockStatus>) -> PlannerOutcome {
    for slot in structure.slots_preorder() {
        let terminal = block_status.get(&slot.block_id).map(BlockStatus::is_terminal).unwrap_or(false);
        if !terminal {
            return PlannerOutcome::Next {
                slot_id: slot.slot_id.clone(),
                block_id: slot.block_id.clone(),
            };
        }
    }
    PlannerOutcome::Complete
}
