//! Authentication session abstraction

use async_trait::async_trait;
use coldline_core::models::Identity;
use std::sync::{PoisonError, RwLock};

/// Source of the signed-in identity
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// The current identity, or `None` when nobody is signed in
    async fn current_identity(&self) -> Option<Identity>;

    async fn sign_out(&self);
}

/// Session holding a fixed identity until signed out
#[derive(Debug, Default)]
pub struct StaticSession {
    identity: RwLock<Option<Identity>>,
}

impl StaticSession {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: Identity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }
}

#[async_trait]
impl AuthSession for StaticSession {
    async fn current_identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_out(&self) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
