//! Approval state machine for reviewable records
//!
//! Records start `Pending` and move once to `Accepted` or `Rejected`. Only an
//! admin may decide and a rejection needs a non-blank reason. The store
//! commits a decision only while the stored record is still pending, and the
//! cache reflects it only after that commit.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use chrono::Utc;
use coldline_core::models::{
    Fields, FieldChanges, Record, RecordDelta, RejectionReason, Review, ReviewStatus,
    UserProfile,
};
use coldline_core::SyncError;

use crate::cache::RecordCache;
use crate::client::RecordStoreClient;

/// A decision an actor can take on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Accept,
    Reject,
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Transition::Accept => write!(f, "accept"),
            Transition::Reject => write!(f, "reject"),
        }
    }
}

pub struct ApprovalWorkflow {
    client: Arc<RecordStoreClient>,
}

impl ApprovalWorkflow {
    pub fn new(client: Arc<RecordStoreClient>) -> Self {
        Self { client }
    }

    /// Transitions `actor` may invoke on `record` right now
    pub fn allowed_transitions(&self, record: &Record, actor: &UserProfile) -> Vec<Transition> {
        if actor.role.is_admin() && record.review().is_pending() {
            vec![Transition::Accept, Transition::Reject]
        } else {
            Vec::new()
        }
    }

    pub async fn accept(
        &self,
        cache: &mut RecordCache,
        record: &Record,
        actor: &UserProfile,
    ) -> Result<Record, SyncError> {
        ensure_admin(actor)?;
        ensure_pending(record)?;

        let review = Review::Accepted {
            responded_at: Utc::now(),
        };
        self.decide(cache, record, actor, review).await
    }

    pub async fn reject(
        &self,
        cache: &mut RecordCache,
        record: &Record,
        actor: &UserProfile,
        reason: &str,
    ) -> Result<Record, SyncError> {
        // A blank reason is refused whoever asks
        let reason = RejectionReason::new(reason)?;
        ensure_admin(actor)?;
        ensure_pending(record)?;

        let review = Review::Rejected {
            responded_at: Utc::now(),
            reason,
        };
        self.decide(cache, record, actor, review).await
    }

    async fn decide(
        &self,
        cache: &mut RecordCache,
        record: &Record,
        actor: &UserProfile,
        review: Review,
    ) -> Result<Record, SyncError> {
        let collection = record.collection();
        let status = review.status();
        let changes = FieldChanges::review(collection, &review);

        let still_pending =
            |fields: &Fields| ReviewStatus::read_from(fields) == Some(ReviewStatus::Pending);
        let result = self
            .client
            .update_if(collection, record.id(), &still_pending, &changes)
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(e @ SyncError::InvalidState(_)) => {
                tracing::info!(
                    collection = %collection,
                    record_id = %record.id(),
                    decision = %status,
                    "Record was decided elsewhere"
                );
                self.refresh_cached(cache, record).await;
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    collection = %collection,
                    record_id = %record.id(),
                    decision = %status,
                    error = %e,
                    "Decision not committed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            collection = %collection,
            record_id = %record.id(),
            decision = %status,
            actor = %actor.uid,
            "Record decided"
        );
        cache.apply_delta(RecordDelta::Modified(updated.clone()));
        Ok(updated)
    }

    /// Replace a stale cached copy with the stored one
    async fn refresh_cached(&self, cache: &mut RecordCache, record: &Record) {
        match self.client.get(record.collection(), record.id()).await {
            Ok(current) => cache.apply_delta(RecordDelta::Modified(current)),
            Err(e) => tracing::debug!(
                record_id = %record.id(),
                error = %e,
                "Could not refresh decided record"
            ),
        }
    }
}

fn ensure_admin(actor: &UserProfile) -> Result<(), SyncError> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(SyncError::Forbidden(format!(
            "role {} cannot decide records",
            actor.role
        )))
    }
}

fn ensure_pending(record: &Record) -> Result<(), SyncError> {
    if record.review().is_pending() {
        Ok(())
    } else {
        Err(SyncError::InvalidState(format!(
            "{}/{} is already {}",
            record.collection(),
            record.id(),
            record.status()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldline_core::models::{Collection, Expense, Payload, RecordScope, ReviewStatus, Role};
    use coldline_storage::MemoryStore;
    use std::time::Duration;

    fn profile(role: Role) -> UserProfile {
        UserProfile {
            role,
            ..UserProfile::least_privilege("actor")
        }
    }

    async fn setup() -> (MemoryStore, ApprovalWorkflow, RecordCache, Record) {
        let store = MemoryStore::default();
        let client = Arc::new(RecordStoreClient::new(
            Arc::new(store.clone()),
            Duration::from_secs(5),
        ));
        let record = client
            .create(Payload::Expense(Expense::default()), RecordScope::default())
            .await
            .unwrap();
        let mut cache = RecordCache::new();
        cache.apply_delta(RecordDelta::Added(record.clone()));
        (store, ApprovalWorkflow::new(client), cache, record)
    }

    #[tokio::test]
    async fn test_non_admin_cannot_accept() {
        let (_store, workflow, mut cache, record) = setup().await;
        for role in [Role::User, Role::Manager, Role::ZoneManager] {
            let err = workflow
                .accept(&mut cache, &record, &profile(role))
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn test_blank_reason_is_validation_for_every_role() {
        let (_store, workflow, mut cache, record) = setup().await;
        for role in [Role::Admin, Role::User, Role::Manager, Role::ZoneManager] {
            let err = workflow
                .reject(&mut cache, &record, &profile(role), "  ")
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_decided_record_is_invalid_state() {
        let (_store, workflow, mut cache, record) = setup().await;
        let admin = profile(Role::Admin);
        let accepted = workflow.accept(&mut cache, &record, &admin).await.unwrap();

        let err = workflow
            .reject(&mut cache, &accepted, &admin, "tarde")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_stale_copy_cannot_override_stored_decision() {
        let (store, workflow, mut cache, record) = setup().await;
        let admin = profile(Role::Admin);
        let mut other_cache = RecordCache::new();
        other_cache.apply_delta(RecordDelta::Added(record.clone()));

        workflow.accept(&mut other_cache, &record, &admin).await.unwrap();

        // `record` is still the pending copy
        let err = workflow
            .reject(&mut cache, &record, &admin, "Duplicado")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidState(_)));
        assert_eq!(
            cache.get(Collection::Expense, record.id()).unwrap().status(),
            ReviewStatus::Accepted
        );

        let stored = coldline_storage::DocumentStore::get(&store, "viaticos", record.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields.get("estado"), Some(&serde_json::json!("aceptado")));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_cache_untouched() {
        let (store, workflow, mut cache, record) = setup().await;
        store.set_available(false);

        let err = workflow
            .accept(&mut cache, &record, &profile(Role::Admin))
            .await
            .unwrap_err();
        assert!(err.is_store_unavailable());
        assert_eq!(
            cache.get(Collection::Expense, record.id()).unwrap().status(),
            ReviewStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_allowed_transitions() {
        let (_store, workflow, mut cache, record) = setup().await;
        let admin = profile(Role::Admin);
        assert_eq!(
            workflow.allowed_transitions(&record, &admin),
            vec![Transition::Accept, Transition::Reject]
        );
        assert!(workflow
            .allowed_transitions(&record, &profile(Role::Manager))
            .is_empty());

        let rejected = workflow
            .reject(&mut cache, &record, &admin, "Sin comprobante")
            .await
            .unwrap();
        assert!(workflow.allowed_transitions(&rejected, &admin).is_empty());
    }
}
