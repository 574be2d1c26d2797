use tracing::info;
use uuid::Uuid;

use super::dto::{BillInput, BillPatchInput, BillView};
use crate::error::{AppError, AppResult};
use crate::store::RecordStore;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("bill {id}"))
}

pub async fn list(store: &dyn RecordStore, owner: Uuid) -> AppResult<Vec<BillView>> {
    let rows = store.list_bills(owner).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn get(store: &dyn RecordStore, owner: Uuid, id: Uuid) -> AppResult<BillView> {
    store
        .get_bill(owner, id)
        .await?
        .map(Into::into)
        .ok_or_else(|| not_found(id))
}

/// Creates a bill under a fresh server id; any client id is ignored.
pub async fn create(
    store: &dyn RecordStore,
    owner: Uuid,
    input: BillInput,
) -> AppResult<BillView> {
    let mut draft = input.into_draft("")?;
    draft.id = Uuid::new_v4();

    let at = store
        .upsert_batch(owner, &[], std::slice::from_ref(&draft))
        .await?;

    info!(%owner, bill_id = %draft.id, "bill created");
    Ok(draft.into_bill(owner, at, at).into())
}

pub async fn update(
    store: &dyn RecordStore,
    owner: Uuid,
    id: Uuid,
    input: BillPatchInput,
) -> AppResult<BillView> {
    let patch = input.into_patch()?;
    store
        .update_bill(owner, id, &patch)
        .await?
        .map(Into::into)
        .ok_or_else(|| not_found(id))
}

pub async fn delete(store: &dyn RecordStore, owner: Uuid, id: Uuid) -> AppResult<()> {
    if store.delete_bill(owner, id).await? {
        info!(%owner, bill_id = %id, "bill deleted");
        Ok(())
    } else {
        Err(not_found(id))
    }
}
