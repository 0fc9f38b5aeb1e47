use std::sync::Arc;

use coldline_core::models::{FieldChanges, Identity, UserProfile, PIN_FIELD, USERS_COLLECTION};
use coldline_core::SyncError;
use coldline_storage::{AuthSession, FieldFilter};
use rand::Rng;

use crate::client::RecordStoreClient;

/// Resolves the acting profile for a signed-in identity
pub struct RoleResolver {
    client: Arc<RecordStoreClient>,
    pin_max_attempts: u32,
}

impl RoleResolver {
    pub fn new(client: Arc<RecordStoreClient>, pin_max_attempts: u32) -> Self {
        Self {
            client,
            pin_max_attempts: pin_max_attempts.max(1),
        }
    }

    /// Load the profile for `identity`.
    ///
    /// A missing profile or an unknown role degrades to `Role::User`; store
    /// failures are returned as `StoreUnavailable`.
    pub async fn resolve(&self, identity: Option<&Identity>) -> Result<UserProfile, SyncError> {
        let identity = identity
            .ok_or_else(|| SyncError::Unauthenticated("no signed-in identity".to_string()))?;

        let mut profile = match self
            .client
            .get_document(USERS_COLLECTION, &identity.uid)
            .await?
        {
            Some(document) => UserProfile::from_fields(&identity.uid, &document.fields),
            None => {
                tracing::warn!(uid = %identity.uid, "No profile found, using least privilege");
                UserProfile::least_privilege(&identity.uid)
            }
        };

        if profile.display_name.is_none() {
            profile.display_name = identity.display_name.clone();
        }

        tracing::debug!(uid = %profile.uid, role = %profile.role, "Profile resolved");
        Ok(profile)
    }

    /// Resolve whoever is signed in on `session`
    pub async fn resolve_session(&self, session: &dyn AuthSession) -> Result<UserProfile, SyncError> {
        let identity = session.current_identity().await;
        self.resolve(identity.as_ref()).await
    }

    /// Return the profile's PIN, assigning a fresh unique one if it has none.
    ///
    /// Candidates are drawn from `1000..=9999` and checked against every
    /// stored profile; `Conflict` once the attempts are used up.
    pub async fn ensure_pin(&self, profile: &mut UserProfile) -> Result<String, SyncError> {
        if let Some(pin) = &profile.pin {
            return Ok(pin.clone());
        }

        for attempt in 1..=self.pin_max_attempts {
            let candidate = rand::rng().random_range(1000..=9999u32).to_string();
            let taken = self
                .client
                .find_documents(USERS_COLLECTION, &FieldFilter::eq(PIN_FIELD, candidate.as_str()))
                .await?;
            if !taken.is_empty() {
                tracing::debug!(attempt, "PIN already assigned, drawing again");
                continue;
            }

            self.client
                .update_document(
                    USERS_COLLECTION,
                    &profile.uid,
                    &FieldChanges::new().set(PIN_FIELD, candidate.as_str()),
                )
                .await?;
            tracing::info!(uid = %profile.uid, attempt, "PIN assigned");
            profile.pin = Some(candidate.clone());
            return Ok(candidate);
        }

        tracing::warn!(
            uid = %profile.uid,
            attempts = self.pin_max_attempts,
            "Could not find a free PIN"
        );
        Err(SyncError::Conflict(format!(
            "no free PIN after {} attempts",
            self.pin_max_attempts
        )))
    }
}
