use super::record::{Collection, Record};

/// A change notification for one record, already normalised.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDelta {
    Added(Record),
    Modified(Record),
    Removed { collection: Collection, id: String },
}

impl RecordDelta {
    pub fn id(&self) -> &str {
        match self {
            RecordDelta::Added(record) | RecordDelta::Modified(record) => record.id(),
            RecordDelta::Removed { id, .. } => id,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            RecordDelta::Added(record) | RecordDelta::Modified(record) => record.collection(),
            RecordDelta::Removed { collection, .. } => *collection,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordDelta::Added(_) => "added",
            RecordDelta::Modified(_) => "modified",
            RecordDelta::Removed { .. } => "removed",
        }
    }
}
