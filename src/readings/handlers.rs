use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{ReadingInput, ReadingPatchInput, ReadingView};
use super::services;
use crate::{auth::Owner, error::AppResult, state::AppState, DeleteResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/readings", get(list_readings).post(create_reading))
        .route(
            "/readings/:id",
            get(get_reading).patch(update_reading).delete(delete_reading),
        )
}

#[instrument(skip(state))]
pub async fn list_readings(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> AppResult<Json<Vec<ReadingView>>> {
    Ok(Json(services::list(state.store.as_ref(), owner).await?))
}

#[instrument(skip(state))]
pub async fn get_reading(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReadingView>> {
    Ok(Json(services::get(state.store.as_ref(), owner, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_reading(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<ReadingInput>, JsonRejection>,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<ReadingView>)> {
    let Json(input) = body?;
    let view = services::create(state.store.as_ref(), owner, input).await?;
    let location = format!("/api/v1/readings/{}", view.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(view)))
}

#[instrument(skip(state, body))]
pub async fn update_reading(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    body: Result<Json<ReadingPatchInput>, JsonRejection>,
) -> AppResult<Json<ReadingView>> {
    let Json(input) = body?;
    Ok(Json(
        services::update(state.store.as_ref(), owner, id, input).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_reading(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    services::delete(state.store.as_ref(), owner, id).await?;
    Ok(Json(DeleteResponse { success: true }))
}
