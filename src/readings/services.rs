use tracing::info;
use uuid::Uuid;

use super::dto::{ReadingInput, ReadingPatchInput, ReadingView};
use crate::error::{AppError, AppResult};
use crate::store::RecordStore;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("reading {id}"))
}

pub async fn list(store: &dyn RecordStore, owner: Uuid) -> AppResult<Vec<ReadingView>> {
    let rows = store.list_readings(owner).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn get(store: &dyn RecordStore, owner: Uuid, id: Uuid) -> AppResult<ReadingView> {
    store
        .get_reading(owner, id)
        .await?
        .map(Into::into)
        .ok_or_else(|| not_found(id))
}

/// Creates a reading under a fresh server id; any client id is ignored.
pub async fn create(
    store: &dyn RecordStore,
    owner: Uuid,
    input: ReadingInput,
) -> AppResult<ReadingView> {
    let mut draft = input.into_draft("")?;
    draft.id = Uuid::new_v4();

    let at = store
        .upsert_batch(owner, std::slice::from_ref(&draft), &[])
        .await?;

    info!(%owner, reading_id = %draft.id, "reading created");
    Ok(draft.into_reading(owner, at, at).into())
}

pub async fn update(
    store: &dyn RecordStore,
    owner: Uuid,
    id: Uuid,
    input: ReadingPatchInput,
) -> AppResult<ReadingView> {
    let patch = input.into_patch()?;
    store
        .update_reading(owner, id, &patch)
        .await?
        .map(Into::into)
        .ok_or_else(|| not_found(id))
}

pub async fn delete(store: &dyn RecordStore, owner: Uuid, id: Uuid) -> AppResult<()> {
    if store.delete_reading(owner, id).await? {
        info!(%owner, reading_id = %id, "reading deleted");
        Ok(())
    } else {
        Err(not_found(id))
    }
}
