//! Coldline Sync Engine
//!
//! This crate is the client-side synchronization and approval layer shared by
//! every review screen: it normalises store documents into records, keeps
//! them in a per-collection cache fed by live subscriptions, narrows them to
//! what the signed-in actor may see and drives the pending → accepted /
//! rejected decisions back through the store.

pub mod board;
pub mod cache;
pub mod client;
pub mod role;
pub mod scope;
pub mod scroll;
pub mod setup;
pub mod workflow;

pub use board::ReviewBoard;
pub use cache::RecordCache;
pub use client::{RecordStoreClient, RecordSubscription, TaggedDelta};
pub use role::RoleResolver;
pub use scope::{visible_set, ScopeFilter};
pub use scroll::{ScrollCommand, ScrollMetrics, ScrollSample, ScrollSyncController};
pub use setup::{initialize_services, SyncServices};
pub use workflow::{ApprovalWorkflow, Transition};

pub use coldline_core::{ErrorMetadata, SyncConfig, SyncError};
