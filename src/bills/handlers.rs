use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{BillInput, BillPatchInput, BillView};
use super::services;
use crate::{auth::Owner, error::AppResult, state::AppState, DeleteResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bills", get(list_bills).post(create_bill))
        .route(
            "/bills/:id",
            get(get_bill).patch(update_bill).delete(delete_bill),
        )
}

#[instrument(skip(state))]
pub async fn list_bills(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> AppResult<Json<Vec<BillView>>> {
    Ok(Json(services::list(state.store.as_ref(), owner).await?))
}

#[instrument(skip(state))]
pub async fn get_bill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BillView>> {
    Ok(Json(services::get(state.store.as_ref(), owner, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_bill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<BillInput>, JsonRejection>,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<BillView>)> {
    let Json(input) = body?;
    let view = services::create(state.store.as_ref(), owner, input).await?;
    let location = format!("/api/v1/bills/{}", view.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(view)))
}

#[instrument(skip(state, body))]
pub async fn update_bill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    body: Result<Json<BillPatchInput>, JsonRejection>,
) -> AppResult<Json<BillView>> {
    let Json(input) = body?;
    Ok(Json(
        services::update(state.store.as_ref(), owner, id, input).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_bill(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    services::delete(state.store.as_ref(), owner, id).await?;
    Ok(Json(DeleteResponse { success: true }))
}
