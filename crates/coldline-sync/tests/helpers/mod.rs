#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use coldline_core::models::Identity;
use coldline_storage::{Document, MemoryStore, StaticSession};
use coldline_sync::{SyncConfig, SyncServices};
use serde_json::json;

pub const ADMIN_UID: &str = "admin-1";
pub const USER_UID: &str = "tech-1";
pub const NORTH_MANAGER_UID: &str = "zone-north";
pub const STORE_MANAGER_UID: &str = "store-oxxo";

/// Test configuration with a short store timeout
pub fn test_config() -> SyncConfig {
    SyncConfig {
        store_timeout: Duration::from_millis(250),
        ..SyncConfig::default()
    }
}

/// A memory store seeded with one profile per role
pub fn seeded_store() -> MemoryStore {
    seed_profiles(MemoryStore::default())
}

/// Like [`seeded_store`], warning about slow readers after `backlog` deltas
pub fn seeded_store_with_backlog(backlog: usize) -> MemoryStore {
    seed_profiles(MemoryStore::new(backlog))
}

fn seed_profiles(store: MemoryStore) -> MemoryStore {
    store.put(
        "users",
        fixtures::document(ADMIN_UID, json!({"role": "admin", "nombre": "Laura"})),
    );
    store.put(
        "users",
        fixtures::document(USER_UID, json!({"role": "user", "tienda": "OXXO Centro"})),
    );
    store.put(
        "users",
        fixtures::document(
            NORTH_MANAGER_UID,
            json!({"role": "gerentezona", "zona": "north"}),
        ),
    );
    store.put(
        "users",
        fixtures::document(
            STORE_MANAGER_UID,
            json!({"role": "gerente", "tienda": "oxxo"}),
        ),
    );
    store
}

/// Services over `store` for a session signed in as `uid`
pub fn services_for(store: &MemoryStore, uid: &str) -> SyncServices {
    SyncServices::with_store(
        &test_config(),
        Arc::new(store.clone()),
        Arc::new(StaticSession::signed_in(Identity::new(uid))),
    )
}

/// Raw stored document, bypassing normalisation
pub async fn raw_document(store: &MemoryStore, collection: &str, id: &str) -> Document {
    use coldline_storage::DocumentStore;
    store
        .get(collection, id)
        .await
        .expect("store reachable")
        .expect("document exists")
}
