//! The `Record` trait and the small query vocabulary (`Filter`/`IndexValue`)
//! every stored domain type implements.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value a collection can be filtered on. Kept deliberately small: the
/// store indexes a handful of fields per collection (status, parent ids,
/// type tags), not arbitrary predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Equality filter over an indexed field. The store only supports
/// equality; range and text search belong to collaborator services, not
/// the core.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }

    fn matches(&self, fields: &HashMap<String, IndexValue>) -> bool {
        match self.op {
            FilterOp::Eq => fields.get(&self.field) == Some(&self.value),
        }
    }
}

/// Evaluate a full filter set against a record's indexed fields (AND
/// semantics — every filter must match).
pub fn filters_match(filters: &[Filter], fields: &HashMap<String, IndexValue>) -> bool {
    filters.iter().all(|f| f.matches(fields))
}

/// A type that can be persisted by the store.
///
/// `collection_name` is the logical table/journal name; `indexed_fields`
/// returns the subset of fields the store keeps queryable. Every record
/// carries its own id; the store layers a row version on top for
/// optimistic concurrency (see [`crate::Stored`]).
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn collection_name() -> &'static str;

    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

/// Current unix-millis timestamp, shared so every domain type stamps
/// `created_at`/`updated_at` consistently.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
