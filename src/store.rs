use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::extract::ArtifactRecord;

/// Identity -> record map shared by every extraction task.
#[derive(Debug, Default)]
pub struct AggregateStore {
    records: DashMap<String, ArtifactRecord>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `identity`, returning the record
    /// it replaced.
    pub fn put(&self, identity: String, record: ArtifactRecord) -> Option<ArtifactRecord> {
        self.records.insert(identity, record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ordered copy of the current contents. Only meaningful once every
    /// writer has joined.
    pub fn snapshot(&self) -> BTreeMap<String, ArtifactRecord> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn into_snapshot(self) -> BTreeMap<String, ArtifactRecord> {
        self.records.into_iter().collect()
    }
}
