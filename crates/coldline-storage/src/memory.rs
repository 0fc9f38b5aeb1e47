use crate::traits::{
    ChangeKind, Document, DocumentChange, DocumentGuard, DocumentStore, DocumentSubscription,
    FieldFilter, StoreError, StoreResult, SubscriptionSender,
};
use crate::StoreBackend;
use async_trait::async_trait;
use coldline_core::models::{FieldChanges, Fields};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

struct Subscriber {
    collection: String,
    filter: Option<FieldFilter>,
    sender: SubscriptionSender,
}

impl Subscriber {
    fn wants(&self, fields: &Fields) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(fields))
    }
}

#[derive(Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    subscribers: Vec<Subscriber>,
    backlog_warning: usize,
    unavailable: bool,
    latency: Duration,
}

impl State {
    /// Fan a committed write out to every live subscriber of `collection`.
    ///
    /// A subscriber sees `Added`/`Removed` when the write moves the document
    /// into or out of its filter. Closed subscribers are dropped; slow ones
    /// keep every change and are reported once their backlog reaches the
    /// warning threshold.
    fn notify(&mut self, collection: &str, id: &str, before: Option<&Fields>, after: Option<&Fields>) {
        let backlog_warning = self.backlog_warning;
        self.subscribers.retain(|sub| {
            if sub.sender.is_closed() {
                return false;
            }
            if sub.collection != collection {
                return true;
            }

            let was = before.is_some_and(|f| sub.wants(f));
            let is = after.is_some_and(|f| sub.wants(f));
            let change = match (was, is, before, after) {
                (false, true, _, Some(fields)) => (ChangeKind::Added, fields),
                (true, true, _, Some(fields)) => (ChangeKind::Modified, fields),
                (true, false, Some(fields), _) => (ChangeKind::Removed, fields),
                _ => return true,
            };

            let change = DocumentChange {
                kind: change.0,
                document: Document::new(id, change.1.clone()),
            };
            match sub.sender.send(change) {
                Some(backlog) => {
                    if backlog == backlog_warning {
                        tracing::warn!(
                            collection = %collection,
                            backlog,
                            "Subscriber is falling behind"
                        );
                    }
                    true
                }
                None => false,
            }
        });
    }

    /// Apply `changes` if `guard` accepts the stored fields, then notify.
    fn commit(
        &mut self,
        collection: &str,
        id: &str,
        guard: Option<&DocumentGuard>,
        changes: &FieldChanges,
    ) -> StoreResult<Document> {
        let stored = self
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        if guard.is_some_and(|guard| !guard(&*stored)) {
            return Err(StoreError::PreconditionFailed(format!(
                "{}/{} changed since it was read",
                collection, id
            )));
        }

        let before = stored.clone();
        changes.apply_to(stored);
        let after = stored.clone();

        self.notify(collection, id, Some(&before), Some(&after));
        Ok(Document::new(id, after))
    }
}

/// In-process document store
///
/// Keeps every collection in memory and fans changes out to subscribers.
/// A subscriber whose backlog reaches `subscription_buffer` is logged, never
/// dropped. Availability and latency can be toggled to simulate an
/// unreachable or slow backend.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new(subscription_buffer: usize) -> Self {
        let state = State {
            backlog_warning: subscription_buffer.max(1),
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent call fail with `Unavailable` (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.state().unavailable = !available;
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Write a full document as another client would, notifying subscribers.
    /// Ignores the availability switch.
    pub fn put(&self, collection: &str, document: Document) {
        let mut state = self.state();
        let before = state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document.fields.clone());
        state.notify(collection, &document.id, before.as_ref(), Some(&document.fields));
    }

    /// Delete a document as another client would, notifying subscribers.
    pub fn remove(&self, collection: &str, id: &str) -> Option<Document> {
        let mut state = self.state();
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))?;
        state.notify(collection, id, Some(&removed), None);
        Some(Document::new(id, removed))
    }

    /// Close every open subscription, as a dropped connection would.
    pub fn disconnect_subscribers(&self) {
        let dropped = std::mem::take(&mut self.state().subscribers).len();
        tracing::debug!(dropped, "Subscribers disconnected");
    }

    /// Number of open subscriptions across all collections
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|sub| !sub.sender.is_closed());
        state.subscribers.len()
    }

    async fn round_trip(&self) -> StoreResult<()> {
        let (latency, unavailable) = {
            let state = self.state();
            (state.latency, state.unavailable)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(StoreError::Unavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> StoreResult<Vec<Document>> {
        self.round_trip().await?;
        let state = self.state();
        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.map_or(true, |f| f.matches(fields)))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.round_trip().await?;
        let state = self.state();
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<FieldFilter>,
    ) -> StoreResult<DocumentSubscription> {
        self.round_trip().await?;
        let mut state = self.state();

        let initial: Vec<Document> = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.as_ref().map_or(true, |f| f.matches(fields)))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let (sender, subscription) = DocumentSubscription::channel();
        for document in initial {
            sender.send(DocumentChange {
                kind: ChangeKind::Added,
                document,
            });
        }

        state.subscribers.push(Subscriber {
            collection: collection.to_string(),
            filter,
            sender,
        });
        tracing::debug!(collection = %collection, "Subscription opened");
        Ok(subscription)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: &FieldChanges,
    ) -> StoreResult<Document> {
        self.round_trip().await?;
        self.state().commit(collection, id, None, changes)
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard: &DocumentGuard,
        changes: &FieldChanges,
    ) -> StoreResult<Document> {
        self.round_trip().await?;
        self.state().commit(collection, id, Some(guard), changes)
    }

    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        self.round_trip().await?;
        let mut state = self.state();

        let id = Uuid::new_v4().simple().to_string();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields.clone());
        state.notify(collection, &id, None, Some(&fields));
        Ok(Document::new(id, fields))
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}
