//! Typed access to the reviewable collections
//!
//! Wraps a [`DocumentStore`] so that every round trip is bounded by the
//! configured timeout and every document leaves as a normalised [`Record`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coldline_core::models::{
    Collection, FieldChanges, Payload, Record, RecordDelta, RecordScope,
};
use coldline_core::SyncError;
use coldline_storage::{
    ChangeKind, Document, DocumentChange, DocumentGuard, DocumentStore, DocumentSubscription,
    FieldFilter, StoreResult,
};

/// A delta tagged with the subscription generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedDelta {
    pub generation: u64,
    pub delta: RecordDelta,
}

/// Live record feed for one collection.
///
/// Documents that cannot be normalised are logged and skipped. Dropping the
/// subscription closes it.
#[derive(Debug)]
pub struct RecordSubscription {
    collection: Collection,
    generation: u64,
    inner: DocumentSubscription,
}

impl RecordSubscription {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next queued delta without waiting
    pub fn try_next(&mut self) -> Option<TaggedDelta> {
        while let Some(change) = self.inner.try_recv() {
            if let Some(delta) = self.normalise(change) {
                return Some(delta);
            }
        }
        None
    }

    /// Wait for the next delta; `None` once the store closed the feed
    pub async fn next(&mut self) -> Option<TaggedDelta> {
        while let Some(change) = self.inner.recv().await {
            if let Some(delta) = self.normalise(change) {
                return Some(delta);
            }
        }
        None
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn normalise(&self, change: DocumentChange) -> Option<TaggedDelta> {
        let delta = match change.kind {
            ChangeKind::Removed => RecordDelta::Removed {
                collection: self.collection,
                id: change.document.id,
            },
            ChangeKind::Added | ChangeKind::Modified => {
                let record = normalise_document(self.collection, &change.document)?;
                if change.kind == ChangeKind::Added {
                    RecordDelta::Added(record)
                } else {
                    RecordDelta::Modified(record)
                }
            }
        };
        Some(TaggedDelta {
            generation: self.generation,
            delta,
        })
    }
}

fn normalise_document(collection: Collection, document: &Document) -> Option<Record> {
    match Record::from_fields(collection, &document.id, &document.fields) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                collection = %collection,
                record_id = %document.id,
                error = %e,
                "Skipping malformed document"
            );
            None
        }
    }
}

pub struct RecordStoreClient {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
    generations: AtomicU64,
}

impl RecordStoreClient {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            generations: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(SyncError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Every well-formed record in `collection`
    #[tracing::instrument(skip(self))]
    pub async fn fetch_all(&self, collection: Collection) -> Result<Vec<Record>, SyncError> {
        let documents = self
            .bounded(
                "fetch_all",
                self.store.fetch_all(collection.store_name(), None),
            )
            .await?;
        Ok(documents
            .iter()
            .filter_map(|doc| normalise_document(collection, doc))
            .collect())
    }

    /// A single record; `NotFound` if absent
    pub async fn get(&self, collection: Collection, id: &str) -> Result<Record, SyncError> {
        let document = self
            .get_document(collection.store_name(), id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("{}/{}", collection, id)))?;
        Record::from_fields(collection, &document.id, &document.fields)
    }

    /// Open a live feed. The store replays current records as `Added` first.
    pub async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<FieldFilter>,
    ) -> Result<RecordSubscription, SyncError> {
        let inner = self
            .bounded(
                "subscribe",
                self.store.subscribe(collection.store_name(), filter),
            )
            .await?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(collection = %collection, generation, "Record subscription opened");
        Ok(RecordSubscription {
            collection,
            generation,
            inner,
        })
    }

    /// Commit `changes` atomically and return the record as stored
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: &FieldChanges,
    ) -> Result<Record, SyncError> {
        let document = self
            .update_document(collection.store_name(), id, changes)
            .await?;
        Record::from_fields(collection, &document.id, &document.fields)
    }

    /// Commit `changes` only if `guard` accepts the stored fields at commit
    /// time; `InvalidState` otherwise.
    #[tracing::instrument(skip(self, guard, changes))]
    pub async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        guard: &DocumentGuard,
        changes: &FieldChanges,
    ) -> Result<Record, SyncError> {
        let document = self
            .bounded(
                "update",
                self.store
                    .update_if(collection.store_name(), id, guard, changes),
            )
            .await?;
        Record::from_fields(collection, &document.id, &document.fields)
    }

    /// Submit a new pending record; the store assigns its id
    pub async fn create(&self, payload: Payload, scope: RecordScope) -> Result<Record, SyncError> {
        let collection = payload.collection();
        let fields = Record::new("", payload, scope, Utc::now()).to_fields()?;
        let document = self
            .bounded(
                "create",
                self.store.create(collection.store_name(), fields),
            )
            .await?;
        tracing::info!(collection = %collection, record_id = %document.id, "Record created");
        Record::from_fields(collection, &document.id, &document.fields)
    }

    pub(crate) async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, SyncError> {
        self.bounded("get", self.store.get(collection, id)).await
    }

    pub(crate) async fn find_documents(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>, SyncError> {
        self.bounded("fetch_all", self.store.fetch_all(collection, Some(filter)))
            .await
    }

    pub(crate) async fn update_document(
        &self,
        collection: &str,
        id: &str,
        changes: &FieldChanges,
    ) -> Result<Document, SyncError> {
        self.bounded("update", self.store.update(collection, id, changes))
            .await
    }
}
