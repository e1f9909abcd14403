//! DocumentVersion: the ordered chapter/section/block-ref tree belonging to
//! a project (spec.md §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use texloom_store::{now_ms, IndexValue, Record};

use super::block::BlockType;
use super::id::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Validated,
    Archived,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Validated => write!(f, "validated"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// A reference to a structural slot's currently active block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRef {
    pub slot_id: String,
    pub block_id: String,
    pub block_type: BlockType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub slot_id: String,
    pub title: String,
    pub blocks: Vec<BlockRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub slot_id: String,
    pub title: String,
    pub sections: Vec<Section>,
}

/// content_structure: the ordered tree of chapters -> sections -> block
/// references that a version fixes at creation time. Which block_id
/// currently occupies a slot changes as refinement blocks are created;
/// the slot layout itself does not.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentStructure {
    pub chapters: Vec<Chapter>,
}

impl ContentStructure {
    /// Pre-order walk of every block-ref slot (spec.md §4.6 planner).
    pub fn slots_preorder(&self) -> Vec<&BlockRef> {
        let mut out = Vec::new();
        for chapter in &self.chapters {
            for section in &chapter.sections {
                for block_ref in &section.blocks {
                    out.push(block_ref);
                }
            }
        }
        out
    }

    /// Replace the block_id occupying `slot_id` with `new_block_id`, used
    /// when a refinement block supersedes its predecessor in the same slot.
    pub fn retarget_slot(&mut self, slot_id: &str, new_block_id: &str) -> bool {
        for chapter in &mut self.chapters {
            for section in &mut chapter.sections {
                for block_ref in &mut section.blocks {
                    if block_ref.slot_id == slot_id {
                        block_ref.block_id = new_block_id.to_string();
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: String,
    pub project_id: String,
    pub version_number: u32,
    pub content_structure: ContentStructure,
    pub status: VersionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DocumentVersion {
    pub fn new(project_id: impl Into<String>, version_number: u32, content_structure: ContentStructure) -> Self {
        let project_id = project_id.into();
        let now = now_ms();
        Self {
            id: generate_id("version", &format!("{project_id}-v{version_number}")),
            project_id,
            version_number,
            content_structure,
            status: VersionStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for DocumentVersion {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "versions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("project_id".into(), IndexValue::String(self.project_id.clone()));
        fields.insert("status".into(), IndexValue::String(self.status.to_string()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_structure() -> ContentStructure {
        ContentStructure {
            chapters: vec![Chapter {
                slot_id: "ch1".into(),
                title: "Intro".into(),
                sections: vec![Section {
                    slot_id: "ch1-s1".into(),
                    title: "Motivation".into(),
                    blocks: vec![
                        BlockRef {
                            slot_id: "ch1-s1-b1".into(),
                            block_id: "block-a".into(),
                            block_type: BlockType::Definition,
                        },
                        BlockRef {
                            slot_id: "ch1-s1-b2".into(),
                            block_id: "block-b".into(),
                            block_type: BlockType::Exercise,
                        },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn preorder_walk_visits_in_document_order() {
        let structure = sample_structure();
        let slots = structure.slots_preorder();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].block_id, "block-a");
        assert_eq!(slots[1].block_id, "block-b");
    }

    #[test]
    fn retarget_slot_replaces_block_id() {
        let mut structure = sample_structure();
        assert!(structure.retarget_slot("ch1-s1-b1", "block-a-refined"));
        assert_eq!(structure.slots_preorder()[0].block_id, "block-a-refined");
    }

    #[test]
    fn retarget_unknown_slot_is_noop() {
        let mut structure = sample_structure();
        assert!(!structure.retarget_slot("nonexistent", "x"));
    }
}
