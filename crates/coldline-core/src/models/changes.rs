//! Field-level changes sent to the store and applied optimistically.

use std::collections::BTreeMap;

use serde_json::Value;

use super::record::{
    Collection, Fields, Review, LEGACY_REJECTION_REASON_FIELD, REJECTION_REASON_FIELD,
    RESPONDED_AT_FIELD, STATUS_FIELD,
};
use super::timestamp::format_timestamp;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set(Value),
    Delete,
}

/// Ordered set of field writes; applied all at once or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    changes: BTreeMap<String, FieldChange>,
}

impl FieldChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changes
            .insert(field.into(), FieldChange::Set(value.into()));
        self
    }

    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.changes.insert(field.into(), FieldChange::Delete);
        self
    }

    /// The writes that move a record of `collection` into `review`.
    pub fn review(collection: Collection, review: &Review) -> Self {
        let mut changes = Self::new().set(STATUS_FIELD, review.status().as_stored());

        changes = match review.responded_at() {
            Some(at) => changes.set(RESPONDED_AT_FIELD, format_timestamp(at)),
            None => changes.delete(RESPONDED_AT_FIELD),
        };

        // Clear both spellings so a stale reason never survives a decision
        changes = changes
            .delete(REJECTION_REASON_FIELD)
            .delete(LEGACY_REJECTION_REASON_FIELD);
        if let Some(reason) = review.rejection_reason() {
            changes = changes.set(collection.rejection_reason_field(), reason.as_str());
        }
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.changes.iter()
    }

    pub fn apply_to(&self, fields: &mut Fields) {
        for (name, change) in &self.changes {
            match change {
                FieldChange::Set(value) => {
                    fields.insert(name.clone(), value.clone());
                }
                FieldChange::Delete => {
                    fields.remove(name);
                }
            }
        }
    }
}
