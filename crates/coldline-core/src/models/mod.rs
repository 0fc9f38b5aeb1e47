//! Data models for the sync engine
//!
//! Reviewable records with their typed payloads and review state, the
//! profile/identity types used for authorization, and the change types that
//! flow between the store and the cache.

mod changes;
mod delta;
mod payload;
mod record;
mod timestamp;
mod user;

pub use changes::*;
pub use delta::*;
pub use payload::*;
pub use record::*;
pub use timestamp::*;
pub use user::*;
