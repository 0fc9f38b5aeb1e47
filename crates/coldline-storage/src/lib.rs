//! Coldline Storage Library
//!
//! This crate provides the capabilities the sync engine consumes: the
//! DocumentStore trait with an in-process implementation, and the AuthSession
//! trait.
//!
//! # Document shape
//!
//! Documents are untyped field maps keyed by store collection name. Typed
//! normalisation into records lives in coldline-core, so every backend only
//! has to move field maps around.

pub mod auth;
pub mod factory;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use auth::{AuthSession, StaticSession};
pub use coldline_core::StoreBackend;
pub use factory::create_store;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStore;
pub use traits::{
    ChangeKind, Document, DocumentChange, DocumentGuard, DocumentStore, DocumentSubscription,
    FieldFilter, StoreError, StoreResult, SubscriptionSender,
};
