use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{PullQuery, PullResponse, PushRequest, PushResponse};
use super::services;
use crate::{auth::Owner, error::AppResult, state::AppState};

const PUSH_BODY_LIMIT: usize = 5 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/push", post(push_changes))
        .route("/sync/pull", get(pull_changes))
        .layer(DefaultBodyLimit::max(PUSH_BODY_LIMIT))
}

#[instrument(skip(state, body))]
pub async fn push_changes(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<PushRequest>, JsonRejection>,
) -> AppResult<Json<PushResponse>> {
    let Json(req) = body?;
    services::push(state.store.as_ref(), owner, req).await?;
    Ok(Json(PushResponse {
        success: true,
        message: "Sync push successful",
    }))
}

#[instrument(skip(state, query))]
pub async fn pull_changes(
    State(state): State<AppState>,
    Owner(owner): Owner,
    query: Result<Query<PullQuery>, QueryRejection>,
) -> AppResult<Json<PullResponse>> {
    let Query(q) = query?;
    let since = services::parse_since(q.since.as_deref())?;
    let res = services::pull(state.store.as_ref(), owner, since).await?;
    Ok(Json(res))
}
