//! Per-collection record cache
//!
//! Holds the latest known copy of every record plus at most one live
//! subscription per collection. Server deltas always replace whole records;
//! optimistic edits are kept only until the next delta for the same id.

use std::collections::HashMap;

use coldline_core::models::{
    Collection, FieldChanges, Record, RecordDelta, CREATED_AT_FIELD,
};
use coldline_core::SyncError;
use coldline_storage::FieldFilter;

use crate::client::{RecordStoreClient, RecordSubscription, TaggedDelta};

#[derive(Debug, Clone)]
struct CachedRecord {
    record: Record,
    optimistic: bool,
}

#[derive(Debug, Default)]
struct CollectionState {
    records: HashMap<String, CachedRecord>,
    subscription: Option<RecordSubscription>,
    filter: Option<FieldFilter>,
    // store closed the feed without a local close
    interrupted: bool,
}

impl CollectionState {
    fn apply(&mut self, delta: RecordDelta) {
        match delta {
            RecordDelta::Added(record) | RecordDelta::Modified(record) => {
                self.records.insert(
                    record.id().to_string(),
                    CachedRecord {
                        record,
                        optimistic: false,
                    },
                );
            }
            RecordDelta::Removed { id, .. } => {
                self.records.remove(&id);
            }
        }
    }

    fn generation(&self) -> Option<u64> {
        self.subscription.as_ref().map(RecordSubscription::generation)
    }

    fn apply_tagged(&mut self, collection: Collection, tagged: TaggedDelta) -> bool {
        if self.generation() != Some(tagged.generation) {
            tracing::debug!(
                collection = %collection,
                generation = tagged.generation,
                "Ignoring delta from a closed subscription"
            );
            return false;
        }
        self.apply(tagged.delta);
        true
    }

    fn feed_lost(&mut self, collection: Collection) {
        tracing::warn!(collection = %collection, "Subscription closed by the store");
        self.subscription = None;
        self.interrupted = true;
    }
}

#[derive(Debug, Default)]
pub struct RecordCache {
    collections: HashMap<Collection, CollectionState>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert or evict by id. Applying the same delta twice is a no-op the
    /// second time.
    pub fn apply_delta(&mut self, delta: RecordDelta) {
        tracing::debug!(
            collection = %delta.collection(),
            record_id = %delta.id(),
            kind = delta.kind(),
            "Applying delta"
        );
        self.collections
            .entry(delta.collection())
            .or_default()
            .apply(delta);
    }

    /// Apply a delta only if it came from the collection's current
    /// subscription. Returns whether it was applied.
    pub fn apply_tagged(&mut self, tagged: TaggedDelta) -> bool {
        let collection = tagged.delta.collection();
        self.collections
            .entry(collection)
            .or_default()
            .apply_tagged(collection, tagged)
    }

    /// Mutate the local copy ahead of server confirmation.
    ///
    /// Fails with `NotFound` if the record is not cached and with
    /// `Validation` if the changes touch the creation time or the result
    /// would not be a valid record; the cache is unchanged on failure.
    pub fn apply_optimistic_update(
        &mut self,
        collection: Collection,
        id: &str,
        changes: &FieldChanges,
    ) -> Result<(), SyncError> {
        // the legacy `fecha` is a payload date once createdAt is written
        if changes.get(CREATED_AT_FIELD).is_some() {
            return Err(SyncError::Validation(
                "createdAt cannot be changed".to_string(),
            ));
        }

        let cached = self
            .collections
            .get_mut(&collection)
            .and_then(|state| state.records.get_mut(id))
            .ok_or_else(|| SyncError::NotFound(format!("{}/{}", collection, id)))?;

        let mut fields = cached.record.to_fields()?;
        changes.apply_to(&mut fields);
        let updated = Record::from_fields(collection, id, &fields)
            .map_err(|e| SyncError::Validation(format!("Rejected local edit: {}", e)))?;

        cached.record = updated;
        cached.optimistic = true;
        Ok(())
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<&Record> {
        self.collections
            .get(&collection)
            .and_then(|state| state.records.get(id))
            .map(|cached| &cached.record)
    }

    /// True while the cached copy is a local prediction
    pub fn is_optimistic(&self, collection: Collection, id: &str) -> bool {
        self.collections
            .get(&collection)
            .and_then(|state| state.records.get(id))
            .is_some_and(|cached| cached.optimistic)
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .get(&collection)
            .map_or(0, |state| state.records.len())
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Records matching `predicate`, newest first with ties broken by id.
    pub fn snapshot<F>(&self, collection: Collection, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let mut records: Vec<Record> = self
            .collections
            .get(&collection)
            .map(|state| {
                state
                    .records
                    .values()
                    .map(|cached| &cached.record)
                    .filter(|record| predicate(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        records.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        records
    }

    /// Replace a collection's records with a one-shot fetch. The active
    /// subscription, if any, is kept.
    pub async fn load(
        &mut self,
        client: &RecordStoreClient,
        collection: Collection,
    ) -> Result<usize, SyncError> {
        let records = client.fetch_all(collection).await?;
        let count = records.len();

        let state = self.collections.entry(collection).or_default();
        state.records = records
            .into_iter()
            .map(|record| {
                (
                    record.id().to_string(),
                    CachedRecord {
                        record,
                        optimistic: false,
                    },
                )
            })
            .collect();

        tracing::debug!(collection = %collection, count, "Collection loaded");
        Ok(count)
    }

    /// Open a subscription for `collection`, closing the previous one.
    ///
    /// The collection's records are cleared once the new subscription is
    /// established; its replay repopulates them on the next [`Self::sync`].
    /// On failure the previous subscription and records are left in place.
    pub async fn subscribe(
        &mut self,
        client: &RecordStoreClient,
        collection: Collection,
        filter: Option<FieldFilter>,
    ) -> Result<u64, SyncError> {
        let subscription = client.subscribe(collection, filter.clone()).await?;
        let generation = subscription.generation();

        let state = self.collections.entry(collection).or_default();
        state.filter = filter;
        state.interrupted = false;
        if let Some(previous) = state.subscription.replace(subscription) {
            tracing::debug!(
                collection = %collection,
                generation = previous.generation(),
                "Replacing subscription"
            );
        }
        state.records.clear();
        Ok(generation)
    }

    /// Close the collection's subscription. Returns whether one was open.
    pub fn close_subscription(&mut self, collection: Collection) -> bool {
        self.collections.get_mut(&collection).is_some_and(|state| {
            state.interrupted = false;
            state.subscription.take().is_some()
        })
    }

    /// True when the store closed the collection's feed and it has not been
    /// reopened or closed locally since.
    pub fn is_interrupted(&self, collection: Collection) -> bool {
        self.collections
            .get(&collection)
            .is_some_and(|state| state.interrupted)
    }

    /// Reopen a feed the store closed, with the filter it was opened with.
    ///
    /// Returns whether a subscription was reopened. As with
    /// [`Self::subscribe`], the replay repopulates the collection.
    pub async fn resume(
        &mut self,
        client: &RecordStoreClient,
        collection: Collection,
    ) -> Result<bool, SyncError> {
        let Some(state) = self.collections.get(&collection) else {
            return Ok(false);
        };
        if !state.interrupted {
            return Ok(false);
        }

        let filter = state.filter.clone();
        let generation = self.subscribe(client, collection, filter).await?;
        tracing::info!(collection = %collection, generation, "Subscription resumed");
        Ok(true)
    }

    pub fn subscription_generation(&self, collection: Collection) -> Option<u64> {
        self.collections
            .get(&collection)
            .and_then(CollectionState::generation)
    }

    /// Apply every delta already queued on the open subscriptions without
    /// waiting. Returns how many were applied.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        for (collection, state) in self.collections.iter_mut() {
            let Some(subscription) = state.subscription.as_mut() else {
                continue;
            };

            let mut pending = Vec::new();
            while let Some(tagged) = subscription.try_next() {
                pending.push(tagged);
            }
            if subscription.is_closed() {
                state.feed_lost(*collection);
            }

            for tagged in pending {
                if state.apply_tagged(*collection, tagged) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Wait for the next delta on `collection`'s subscription and apply it.
    ///
    /// Returns `None` if there is no subscription or the store closed it.
    pub async fn next_change(&mut self, collection: Collection) -> Option<RecordDelta> {
        let state = self.collections.get_mut(&collection)?;
        loop {
            let subscription = state.subscription.as_mut()?;
            let Some(tagged) = subscription.next().await else {
                state.feed_lost(collection);
                return None;
            };
            let delta = tagged.delta.clone();
            if state.apply_tagged(collection, tagged) {
                return Some(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use coldline_core::models::{ErrorReport, Expense, Payload, RecordScope, ReviewStatus};

    fn report(id: &str, day: u32) -> Record {
        Record::new(
            id,
            Payload::ErrorReport(ErrorReport::default()),
            RecordScope::default(),
            Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_apply_delta_twice_is_idempotent() {
        let mut once = RecordCache::new();
        once.apply_delta(RecordDelta::Added(report("a", 1)));

        let mut twice = RecordCache::new();
        twice.apply_delta(RecordDelta::Added(report("a", 1)));
        twice.apply_delta(RecordDelta::Added(report("a", 1)));

        let all = |_: &Record| true;
        assert_eq!(
            once.snapshot(Collection::ErrorReport, all),
            twice.snapshot(Collection::ErrorReport, all)
        );
        assert_eq!(twice.len(Collection::ErrorReport), 1);
    }

    #[test]
    fn test_removed_delta_evicts() {
        let mut cache = RecordCache::new();
        cache.apply_delta(RecordDelta::Added(report("a", 1)));
        let removed = RecordDelta::Removed {
            collection: Collection::ErrorReport,
            id: "a".to_string(),
        };
        cache.apply_delta(removed.clone());
        cache.apply_delta(removed);
        assert!(cache.is_empty(Collection::ErrorReport));
    }

    #[test]
    fn test_snapshot_orders_newest_first_then_id() {
        let mut cache = RecordCache::new();
        cache.apply_delta(RecordDelta::Added(report("d1", 1)));
        cache.apply_delta(RecordDelta::Added(report("d3", 3)));
        cache.apply_delta(RecordDelta::Added(report("d2-b", 2)));
        cache.apply_delta(RecordDelta::Added(report("d2-a", 2)));

        let ids: Vec<String> = cache
            .snapshot(Collection::ErrorReport, |_| true)
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["d3", "d2-a", "d2-b", "d1"]);
    }

    #[test]
    fn test_optimistic_update_is_superseded_by_server() {
        let mut cache = RecordCache::new();
        cache.apply_delta(RecordDelta::Added(report("a", 1)));

        let accept = FieldChanges::new()
            .set("estado", "aceptado")
            .set("fecha_respuesta", "2025-06-02T00:00:00Z");
        cache
            .apply_optimistic_update(Collection::ErrorReport, "a", &accept)
            .unwrap();
        assert!(cache.is_optimistic(Collection::ErrorReport, "a"));
        assert_eq!(
            cache.get(Collection::ErrorReport, "a").unwrap().status(),
            ReviewStatus::Accepted
        );

        cache.apply_delta(RecordDelta::Modified(report("a", 1)));
        assert!(!cache.is_optimistic(Collection::ErrorReport, "a"));
        assert_eq!(
            cache.get(Collection::ErrorReport, "a").unwrap().status(),
            ReviewStatus::Pending
        );
    }

    #[test]
    fn test_invalid_optimistic_update_leaves_cache_untouched() {
        let mut cache = RecordCache::new();
        let original = report("a", 1);
        cache.apply_delta(RecordDelta::Added(original.clone()));

        // rechazado without a reason breaks the record invariants
        let bad = FieldChanges::new()
            .set("estado", "rechazado")
            .set("fecha_respuesta", "2025-06-02T00:00:00Z");
        let err = cache
            .apply_optimistic_update(Collection::ErrorReport, "a", &bad)
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(cache.get(Collection::ErrorReport, "a"), Some(&original));
        assert!(!cache.is_optimistic(Collection::ErrorReport, "a"));
    }

    #[test]
    fn test_optimistic_update_cannot_move_creation_time() {
        let mut cache = RecordCache::new();
        let original = report("a", 1);
        cache.apply_delta(RecordDelta::Added(original.clone()));

        let err = cache
            .apply_optimistic_update(
                Collection::ErrorReport,
                "a",
                &FieldChanges::new().set("createdAt", "2030-01-01T00:00:00Z"),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        let err = cache
            .apply_optimistic_update(
                Collection::ErrorReport,
                "a",
                &FieldChanges::new().delete("createdAt"),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(cache.get(Collection::ErrorReport, "a"), Some(&original));
        assert!(!cache.is_optimistic(Collection::ErrorReport, "a"));
    }

    #[test]
    fn test_optimistic_expense_date_edit_keeps_creation_time() {
        let mut cache = RecordCache::new();
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        cache.apply_delta(RecordDelta::Added(Record::new(
            "v1",
            Payload::Expense(Expense::default()),
            RecordScope::default(),
            created,
        )));

        cache
            .apply_optimistic_update(
                Collection::Expense,
                "v1",
                &FieldChanges::new().set("fecha", "2024-01-01"),
            )
            .unwrap();
        assert_eq!(
            cache.get(Collection::Expense, "v1").unwrap().created_at(),
            created
        );
    }

    #[test]
    fn test_optimistic_update_on_missing_record_is_not_found() {
        let mut cache = RecordCache::new();
        let err = cache
            .apply_optimistic_update(
                Collection::Expense,
                "ghost",
                &FieldChanges::new().set("monto", 1),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_snapshot_predicate_filters() {
        let mut cache = RecordCache::new();
        cache.apply_delta(RecordDelta::Added(report("old", 1)));
        cache.apply_delta(RecordDelta::Added(report("new", 5)));
        let cutoff = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::days(2);
        let recent = cache.snapshot(Collection::ErrorReport, |r| r.created_at() > cutoff);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id(), "new");
    }

    #[test]
    fn test_tagged_delta_without_subscription_is_ignored() {
        let mut cache = RecordCache::new();
        let applied = cache.apply_tagged(TaggedDelta {
            generation: 7,
            delta: RecordDelta::Added(report("a", 1)),
        });
        assert!(!applied);
        assert!(cache.is_empty(Collection::ErrorReport));
    }
}
