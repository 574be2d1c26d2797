//! Maps a request to the user that owns its records.
//!
//! Only one user exists today, identified by a configured email. Everything
//! above this module sees an opaque owner id, so swapping in token-derived
//! identities only means another [`OwnerResolver`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{RecordStore, StoreError, StoreResult};

#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve_owner(&self) -> StoreResult<Uuid>;
}

/// Resolves every caller to the single default user, creating it on first use.
pub struct DefaultTenant {
    store: Arc<dyn RecordStore>,
    email: String,
}

/// Lookup/insert rounds before giving up. A lost insert race needs two.
const MAX_ATTEMPTS: usize = 3;

impl DefaultTenant {
    pub fn new(store: Arc<dyn RecordStore>, email: impl Into<String>) -> Self {
        Self {
            store,
            email: email.into(),
        }
    }
}

#[async_trait]
impl OwnerResolver for DefaultTenant {
    async fn resolve_owner(&self) -> StoreResult<Uuid> {
        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(user) = self.store.find_user_by_email(&self.email).await? {
                return Ok(user.id);
            }

            let at = self.store.now().await?;
            match self.store.insert_user(&self.email, at).await {
                Ok(user) => {
                    info!(user_id = %user.id, email = %user.email, "default user created");
                    return Ok(user.id);
                }
                Err(StoreError::Conflict(msg)) => {
                    // Another request created the user first; look it up again.
                    debug!(attempt, %msg, "default user insert lost a race");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(email = %self.email, "default user could not be resolved");
        Err(StoreError::Unavailable(format!(
            "could not resolve user {} after {MAX_ATTEMPTS} attempts",
            self.email
        )))
    }
}
