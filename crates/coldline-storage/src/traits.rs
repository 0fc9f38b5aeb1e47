//! Document store abstraction
//!
//! This module defines the DocumentStore trait that all store backends must
//! implement, together with the untyped document types they exchange.

use crate::StoreBackend;
use async_trait::async_trait;
use coldline_core::models::{FieldChanges, Fields};
use coldline_core::SyncError;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) | StoreError::Config(msg) => {
                SyncError::StoreUnavailable(msg)
            }
            StoreError::NotFound(msg) => SyncError::NotFound(msg),
            StoreError::PreconditionFailed(msg) => SyncError::InvalidState(msg),
            StoreError::InvalidDocument(msg) => SyncError::Malformed {
                collection: String::new(),
                id: String::new(),
                reason: msg,
            },
        }
    }
}

/// A stored document: its id plus an untyped field mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One real-time notification. For `Removed` the document carries the last
/// known fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Equality filter on a single field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// Check run against the stored fields inside a conditional update
pub type DocumentGuard = dyn Fn(&Fields) -> bool + Send + Sync;

/// Store side of a subscription.
///
/// Sending never blocks and never drops a change; the queued backlog is
/// tracked so backends can report slow readers.
#[derive(Debug, Clone)]
pub struct SubscriptionSender {
    sender: mpsc::UnboundedSender<DocumentChange>,
    backlog: Arc<AtomicUsize>,
}

impl SubscriptionSender {
    /// Queue a change. Returns the backlog including this change, or `None`
    /// once the subscriber has gone away.
    pub fn send(&self, change: DocumentChange) -> Option<usize> {
        let backlog = self.backlog.fetch_add(1, Ordering::AcqRel) + 1;
        if self.sender.send(change).is_err() {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(backlog)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Live feed of document changes for one collection.
///
/// Dropping the subscription closes it; nothing is delivered afterwards.
#[derive(Debug)]
pub struct DocumentSubscription {
    receiver: mpsc::UnboundedReceiver<DocumentChange>,
    backlog: Arc<AtomicUsize>,
}

impl DocumentSubscription {
    /// A connected sender/subscription pair
    pub fn channel() -> (SubscriptionSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));
        (
            SubscriptionSender {
                sender,
                backlog: backlog.clone(),
            },
            Self { receiver, backlog },
        )
    }

    /// Wait for the next change; `None` once the store has closed the feed.
    pub async fn recv(&mut self) -> Option<DocumentChange> {
        let change = self.receiver.recv().await;
        self.received(change)
    }

    /// Next already-delivered change, without waiting. Use
    /// [`DocumentSubscription::is_closed`] to tell an empty queue from a
    /// closed feed.
    pub fn try_recv(&mut self) -> Option<DocumentChange> {
        let change = self.receiver.try_recv().ok();
        self.received(change)
    }

    /// Changes queued but not yet received
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    fn received(&self, change: Option<DocumentChange>) -> Option<DocumentChange> {
        if change.is_some() {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
        }
        change
    }

    /// True once the store side has gone away and the queue is drained.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed() && self.receiver.is_empty()
    }
}

impl Stream for DocumentSubscription {
    type Item = DocumentChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.receiver.poll_recv(cx) {
            Poll::Ready(change) => Poll::Ready(self.received(change)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Document store abstraction trait
///
/// Collection-scoped CRUD plus real-time subscriptions. Collections are named
/// by their store name (e.g. `viaticos`, `users`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection`, optionally narrowed by an equality filter
    async fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> StoreResult<Vec<Document>>;

    /// A single document, or `None` if absent
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Open a subscription. The current matching documents are delivered first
    /// as `Added`, followed by live changes in commit order.
    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<FieldFilter>,
    ) -> StoreResult<DocumentSubscription>;

    /// Apply `changes` to an existing document atomically and return the
    /// committed document. Fails with `NotFound` if the id is absent.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: &FieldChanges,
    ) -> StoreResult<Document>;

    /// Like [`DocumentStore::update`], but commits only if `guard` accepts the
    /// stored fields at commit time. Fails with `PreconditionFailed` otherwise;
    /// the check and the write are one atomic step.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard: &DocumentGuard,
        changes: &FieldChanges,
    ) -> StoreResult<Document>;

    /// Create a document with a freshly assigned id
    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<Document>;

    /// Get the store backend type
    fn backend_type(&self) -> StoreBackend;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_filter_matches_exact_value() {
        let mut fields = Fields::new();
        fields.insert("pin".to_string(), json!("4821"));
        assert!(FieldFilter::eq("pin", "4821").matches(&fields));
        assert!(!FieldFilter::eq("pin", 4821).matches(&fields));
        assert!(!FieldFilter::eq("zona", "north").matches(&fields));
    }

    #[test]
    fn test_store_error_maps_to_sync_error() {
        let err: SyncError = StoreError::Unavailable("connection reset".to_string()).into();
        assert!(err.is_store_unavailable());

        let err: SyncError = StoreError::NotFound("viaticos/v1".to_string()).into();
        assert_eq!(err, SyncError::NotFound("viaticos/v1".to_string()));

        let err: SyncError = StoreError::PreconditionFailed("viaticos/v1".to_string()).into();
        assert!(matches!(err, SyncError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_subscription_tracks_backlog() {
        let (sender, mut subscription) = DocumentSubscription::channel();
        let change = DocumentChange {
            kind: ChangeKind::Added,
            document: Document::new("v1", Fields::new()),
        };
        assert_eq!(sender.send(change.clone()), Some(1));
        assert_eq!(sender.send(change.clone()), Some(2));
        assert_eq!(subscription.backlog(), 2);

        assert!(subscription.try_recv().is_some());
        assert_eq!(subscription.recv().await, Some(change.clone()));
        assert_eq!(subscription.backlog(), 0);

        drop(subscription);
        assert!(sender.is_closed());
        assert_eq!(sender.send(change), None);
    }
}
