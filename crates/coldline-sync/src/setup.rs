//! Service initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use coldline_core::models::Collection;
use coldline_core::{SyncConfig, SyncError};
use coldline_storage::{create_store, AuthSession, DocumentStore};

use crate::board::ReviewBoard;
use crate::client::RecordStoreClient;
use crate::role::RoleResolver;
use crate::workflow::ApprovalWorkflow;

/// Everything a screen needs, wired around one document store
#[derive(Clone)]
pub struct SyncServices {
    pub config: SyncConfig,
    pub store: Arc<dyn DocumentStore>,
    pub session: Arc<dyn AuthSession>,
    pub client: Arc<RecordStoreClient>,
    pub resolver: Arc<RoleResolver>,
    pub workflow: Arc<ApprovalWorkflow>,
}

impl SyncServices {
    /// Wire the services around an already constructed store
    pub fn with_store(
        config: &SyncConfig,
        store: Arc<dyn DocumentStore>,
        session: Arc<dyn AuthSession>,
    ) -> Self {
        let client = Arc::new(RecordStoreClient::new(store.clone(), config.store_timeout));
        let resolver = Arc::new(RoleResolver::new(client.clone(), config.pin_max_attempts));
        let workflow = Arc::new(ApprovalWorkflow::new(client.clone()));

        Self {
            config: config.clone(),
            store,
            session,
            client,
            resolver,
            workflow,
        }
    }

    pub async fn open_board(&self, collection: Collection) -> Result<ReviewBoard, SyncError> {
        ReviewBoard::open(self, collection).await
    }
}

/// Initialize tracing and the document store, returning the wired services
pub async fn initialize_services(
    config: &SyncConfig,
    session: Arc<dyn AuthSession>,
) -> Result<SyncServices> {
    #[cfg(feature = "telemetry")]
    coldline_infra::init_telemetry(&config.telemetry)?;

    let store = create_store(config)
        .await
        .context("Failed to create document store")?;

    tracing::info!(
        environment = %config.environment,
        backend = %store.backend_type(),
        timeout_ms = config.store_timeout.as_millis() as u64,
        "Sync services initialized"
    );

    Ok(SyncServices::with_store(config, store, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldline_core::StoreBackend;
    use coldline_storage::StaticSession;

    #[tokio::test]
    async fn test_initialize_services_with_memory_backend() {
        let services = initialize_services(&SyncConfig::default(), Arc::new(StaticSession::anonymous()))
            .await
            .unwrap();
        assert_eq!(services.store.backend_type(), StoreBackend::Memory);
        assert_eq!(services.client.timeout(), SyncConfig::default().store_timeout);
    }

    #[tokio::test]
    async fn test_initialize_services_rejects_unimplemented_backend() {
        let config = SyncConfig {
            store_backend: StoreBackend::Firestore,
            ..SyncConfig::default()
        };
        let result = initialize_services(&config, Arc::new(StaticSession::anonymous())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_board_requires_identity() {
        let services = initialize_services(&SyncConfig::default(), Arc::new(StaticSession::anonymous()))
            .await
            .unwrap();
        let err = services
            .open_board(Collection::Expense)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Unauthenticated(_)));
    }
}
