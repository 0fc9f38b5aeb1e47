#[cfg(feature = "storage-memory")]
use crate::MemoryStore;
use crate::{DocumentStore, StoreBackend, StoreError, StoreResult};
use coldline_core::SyncConfig;
use std::sync::Arc;

/// Create a document store based on configuration
pub async fn create_store(config: &SyncConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config.store_backend {
        #[cfg(feature = "storage-memory")]
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(config.subscription_buffer))),

        #[cfg(not(feature = "storage-memory"))]
        StoreBackend::Memory => Err(StoreError::Config(
            "Memory store backend not available (storage-memory feature not enabled)".to_string(),
        )),

        StoreBackend::Firestore => Err(StoreError::Config(
            "Firestore store backend not yet implemented".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_store_memory() {
        let store = create_store(&SyncConfig::default()).await.unwrap();
        assert_eq!(store.backend_type(), StoreBackend::Memory);
    }

    #[tokio::test]
    async fn test_create_store_firestore_is_config_error() {
        let config = SyncConfig {
            store_backend: StoreBackend::Firestore,
            ..SyncConfig::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(StoreError::Config(_))
        ));
    }
}
