use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Owner of the records a request reads or writes.
///
/// Runs behind the API-key guard, so resolution only ever happens for
/// authenticated callers.
pub struct Owner(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let owner = state.owners.resolve_owner().await?;
        Ok(Owner(owner))
    }
}
