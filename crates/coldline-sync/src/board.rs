//! One review list bound to one signed-in actor
//!
//! Ties the cache, scope filter and approval workflow together for a single
//! collection so a screen only renders `visible()` and forwards the actor's
//! decisions.

use std::sync::Arc;

use coldline_core::models::{Collection, Record, RecordDelta, UserProfile};
use coldline_core::SyncError;

use crate::cache::RecordCache;
use crate::client::RecordStoreClient;
use crate::scope::ScopeFilter;
use crate::setup::SyncServices;
use crate::workflow::{ApprovalWorkflow, Transition};

pub struct ReviewBoard {
    collection: Collection,
    actor: UserProfile,
    scope: ScopeFilter,
    cache: RecordCache,
    client: Arc<RecordStoreClient>,
    workflow: Arc<ApprovalWorkflow>,
    online: bool,
}

impl ReviewBoard {
    /// Resolve the signed-in actor, subscribe to `collection` and apply the
    /// initial replay.
    pub async fn open(services: &SyncServices, collection: Collection) -> Result<Self, SyncError> {
        let actor = services
            .resolver
            .resolve_session(services.session.as_ref())
            .await?;
        let scope = ScopeFilter::for_profile(&actor);

        let mut cache = RecordCache::new();
        cache.subscribe(&services.client, collection, None).await?;
        let replayed = cache.sync();

        tracing::info!(
            collection = %collection,
            uid = %actor.uid,
            role = %actor.role,
            records = replayed,
            "Review board opened"
        );

        Ok(Self {
            collection,
            actor,
            scope,
            cache,
            client: services.client.clone(),
            workflow: services.workflow.clone(),
            online: true,
        })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn actor(&self) -> &UserProfile {
        &self.actor
    }

    /// Records the actor may see, newest first
    pub fn visible(&self) -> Vec<Record> {
        self.cache
            .snapshot(self.collection, |record| self.scope.allows(record))
    }

    /// Apply deltas already delivered by the subscription.
    ///
    /// A feed the store closed is reopened and its replay applied; fails with
    /// `StoreUnavailable` while it cannot be reopened, and the next call
    /// retries.
    pub async fn sync(&mut self) -> Result<usize, SyncError> {
        let applied = self.cache.sync();
        if self.resume().await? {
            return Ok(applied + self.cache.sync());
        }
        Ok(applied)
    }

    /// Wait for and apply the next delta, reopening a feed the store closed.
    /// The replay of a reopened feed is applied as a whole before waiting
    /// again.
    ///
    /// `None` once the board is closed or the feed cannot be reopened.
    pub async fn next_change(&mut self) -> Option<RecordDelta> {
        loop {
            if let Some(delta) = self.cache.next_change(self.collection).await {
                return Some(delta);
            }
            match self.resume().await {
                Ok(true) => {
                    self.cache.sync();
                }
                Ok(false) => return None,
                Err(e) => {
                    tracing::warn!(
                        collection = %self.collection,
                        error = %e,
                        "Could not reopen subscription"
                    );
                    return None;
                }
            }
        }
    }

    /// Reload the collection with a one-shot fetch
    pub async fn refresh(&mut self) -> Result<usize, SyncError> {
        self.cache.load(&self.client, self.collection).await
    }

    /// A visible record by id; hidden and unknown ids are both `NotFound`
    pub fn record(&self, id: &str) -> Result<Record, SyncError> {
        self.cache
            .get(self.collection, id)
            .filter(|record| self.scope.allows(record))
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("{}/{}", self.collection, id)))
    }

    pub fn allowed_transitions(&self, id: &str) -> Result<Vec<Transition>, SyncError> {
        let record = self.record(id)?;
        Ok(self.workflow.allowed_transitions(&record, &self.actor))
    }

    pub async fn accept(&mut self, id: &str) -> Result<Record, SyncError> {
        let record = self.record(id)?;
        self.ensure_online()?;
        self.workflow
            .accept(&mut self.cache, &record, &self.actor)
            .await
    }

    pub async fn reject(&mut self, id: &str, reason: &str) -> Result<Record, SyncError> {
        let record = self.record(id)?;
        self.ensure_online()?;
        self.workflow
            .reject(&mut self.cache, &record, &self.actor, reason)
            .await
    }

    async fn resume(&mut self) -> Result<bool, SyncError> {
        self.cache.resume(&self.client, self.collection).await
    }

    /// Network reachability as reported by the host
    pub fn set_online(&mut self, online: bool) {
        if self.online != online {
            tracing::info!(collection = %self.collection, online, "Reachability changed");
        }
        self.online = online;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Drop the subscription; cached records stay readable
    pub fn close(&mut self) {
        if self.cache.close_subscription(self.collection) {
            tracing::debug!(collection = %self.collection, "Review board closed");
        }
    }

    fn ensure_online(&self) -> Result<(), SyncError> {
        if self.online {
            Ok(())
        } else {
            Err(SyncError::StoreUnavailable(
                "device is offline".to_string(),
            ))
        }
    }
}
