//! Sample data for a fresh database.

use rust_decimal::Decimal;
use time::macros::date;
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::{BillDraft, ReadingDraft, RecordStore};
use crate::tenant::OwnerResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub owner: Uuid,
    pub readings_inserted: usize,
    pub bills_inserted: usize,
}

fn sample_readings() -> Vec<ReadingDraft> {
    vec![
        ReadingDraft {
            id: Uuid::new_v4(),
            date: date!(2023 - 08 - 01),
            ground_floor_reading: 1000,
            first_floor_reading: 500,
            notes: Some("Initial reading".into()),
            image_url: None,
        },
        ReadingDraft {
            id: Uuid::new_v4(),
            date: date!(2023 - 09 - 01),
            ground_floor_reading: 1200,
            first_floor_reading: 600,
            notes: Some("September reading".into()),
            image_url: None,
        },
    ]
}

fn sample_bills() -> Vec<BillDraft> {
    vec![
        BillDraft {
            id: Uuid::new_v4(),
            bill_number: Some("BILL-2023-001".into()),
            billing_period: Some("2023-08".into()),
            due_date: Some(date!(2023 - 09 - 15)),
            amount: Decimal::new(15050, 2),
            units_consumed: 300,
            paid_date: Some(date!(2023 - 09 - 10)),
        },
        BillDraft {
            id: Uuid::new_v4(),
            bill_number: Some("BILL-2023-002".into()),
            billing_period: Some("2023-09".into()),
            due_date: Some(date!(2023 - 10 - 15)),
            amount: Decimal::new(18000, 2),
            units_consumed: 350,
            paid_date: None,
        },
    ]
}

/// Inserts sample readings and bills for the default owner. Each kind is
/// only seeded when the owner has none yet, so reruns change nothing.
pub async fn seed(
    store: &dyn RecordStore,
    owners: &dyn OwnerResolver,
) -> AppResult<SeedReport> {
    let owner = owners.resolve_owner().await?;

    let readings = if store.list_readings(owner).await?.is_empty() {
        sample_readings()
    } else {
        info!(%owner, "readings already exist, skipping");
        Vec::new()
    };
    let bills = if store.list_bills(owner).await?.is_empty() {
        sample_bills()
    } else {
        info!(%owner, "bills already exist, skipping");
        Vec::new()
    };

    if !readings.is_empty() || !bills.is_empty() {
        store.upsert_batch(owner, &readings, &bills).await?;
    }

    Ok(SeedReport {
        owner,
        readings_inserted: readings.len(),
        bills_inserted: bills.len(),
    })
}
