//! Push reconciliation and pull differencing.

use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use super::dto::{PullResponse, PushRequest};
use crate::error::AppResult;
use crate::store::{BillDraft, ReadingDraft, RecordStore};
use crate::validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    pub readings: usize,
    pub bills: usize,
    /// Reconciliation time stamped on every applied row.
    pub at: OffsetDateTime,
}

/// Merges a client batch into the store on behalf of `owner`.
///
/// The whole batch is validated before anything is written, and the store
/// applies it atomically. Every row ends up owned by `owner` with
/// `updated_at` set to the reconciliation time.
pub async fn push(
    store: &dyn RecordStore,
    owner: Uuid,
    req: PushRequest,
) -> AppResult<PushOutcome> {
    let readings = req
        .readings
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_draft(&format!("readings[{i}].")))
        .collect::<Result<Vec<ReadingDraft>, ValidationError>>()?;
    let bills = req
        .bills
        .into_iter()
        .enumerate()
        .map(|(i, b)| b.into_draft(&format!("bills[{i}].")))
        .collect::<Result<Vec<BillDraft>, ValidationError>>()?;

    let at = store.upsert_batch(owner, &readings, &bills).await?;

    info!(
        %owner,
        readings = readings.len(),
        bills = bills.len(),
        "sync push applied"
    );
    Ok(PushOutcome {
        readings: readings.len(),
        bills: bills.len(),
        at,
    })
}

/// Returns the rows of `owner` changed after `since` (all rows when `None`)
/// together with the checkpoint for the next pull.
pub async fn pull(
    store: &dyn RecordStore,
    owner: Uuid,
    since: Option<OffsetDateTime>,
) -> AppResult<PullResponse> {
    // The checkpoint comes from the scan itself: writes it could not see are
    // stamped later and match the next pull.
    let changes = store.changes_since(owner, since).await?;

    debug!(
        %owner,
        since = ?since,
        readings = changes.readings.len(),
        bills = changes.bills.len(),
        "sync pull"
    );
    Ok(PullResponse {
        readings: changes.readings.into_iter().map(Into::into).collect(),
        bills: changes.bills.into_iter().map(Into::into).collect(),
        timestamp: changes.checkpoint,
    })
}

/// Parses the `since` query parameter (RFC 3339).
pub fn parse_since(raw: Option<&str>) -> Result<Option<OffsetDateTime>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => OffsetDateTime::parse(s, &Rfc3339).map(Some).map_err(|_| {
            ValidationError::new("since", "invalid timestamp (expected ISO-8601 / RFC 3339)")
        }),
    }
}
