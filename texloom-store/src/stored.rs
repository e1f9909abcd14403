use crate::record::Record;

/// A record as it exists in the store: the domain value plus the row
/// version optimistic-concurrency updates are checked against.
#[derive(Debug, Clone)]
pub struct Stored<T: Record> {
    pub value: T,
    pub version: u64,
}

impl<T: Record> Stored<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}
