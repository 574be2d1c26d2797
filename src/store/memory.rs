use std::collections::HashMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    Bill, BillDraft, BillPatch, ChangeSet, Reading, ReadingDraft, ReadingPatch, RecordStore,
    StoreError, StoreResult, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    readings: HashMap<Uuid, Reading>,
    bills: HashMap<Uuid, Bill>,
}

/// In-process record store.
///
/// One lock guards all tables, so a batch upsert is atomic and a scan sees a
/// consistent snapshot. Writes are stamped and scans take their checkpoint
/// while holding that lock. The clock has microsecond resolution like
/// PostgreSQL and never hands out the same instant twice.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    last_tick: Mutex<OffsetDateTime>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            last_tick: Mutex::new(OffsetDateTime::UNIX_EPOCH),
        }
    }

    async fn tick(&self) -> OffsetDateTime {
        let mut last = self.last_tick.lock().await;
        let wall = OffsetDateTime::now_utc();
        let wall = wall
            .replace_nanosecond(wall.nanosecond() / 1_000 * 1_000)
            .unwrap_or(wall);
        let tick = if wall > *last {
            wall
        } else {
            *last + Duration::microseconds(1)
        };
        *last = tick;
        tick
    }
}

fn changed_after(
    since: Option<OffsetDateTime>,
    created: OffsetDateTime,
    updated: OffsetDateTime,
) -> bool {
    match since {
        None => true,
        Some(since) => updated > since || created > since,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn now(&self) -> StoreResult<OffsetDateTime> {
        Ok(self.tick().await)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, email: &str, at: OffsetDateTime) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!("user {email} already exists")));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: at,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn upsert_batch(
        &self,
        owner: Uuid,
        readings: &[ReadingDraft],
        bills: &[BillDraft],
    ) -> StoreResult<OffsetDateTime> {
        let mut tables = self.tables.write().await;

        // Check every row before touching any, so a conflict leaves nothing behind.
        for r in readings {
            if matches!(tables.readings.get(&r.id), Some(existing) if existing.user_id != owner) {
                return Err(StoreError::Conflict(format!(
                    "reading {} belongs to another owner",
                    r.id
                )));
            }
        }
        for b in bills {
            if matches!(tables.bills.get(&b.id), Some(existing) if existing.user_id != owner) {
                return Err(StoreError::Conflict(format!(
                    "bill {} belongs to another owner",
                    b.id
                )));
            }
        }

        let at = self.tick().await;
        for r in readings {
            let created_at = tables.readings.get(&r.id).map_or(at, |e| e.created_at);
            tables
                .readings
                .insert(r.id, r.clone().into_reading(owner, created_at, at));
        }
        for b in bills {
            let created_at = tables.bills.get(&b.id).map_or(at, |e| e.created_at);
            tables
                .bills
                .insert(b.id, b.clone().into_bill(owner, created_at, at));
        }
        Ok(at)
    }

    async fn changes_since(
        &self,
        owner: Uuid,
        since: Option<OffsetDateTime>,
    ) -> StoreResult<ChangeSet> {
        let tables = self.tables.read().await;
        let checkpoint = self.tick().await;

        let mut readings: Vec<Reading> = tables
            .readings
            .values()
            .filter(|r| r.user_id == owner && changed_after(since, r.created_at, r.updated_at))
            .cloned()
            .collect();
        readings.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let mut bills: Vec<Bill> = tables
            .bills
            .values()
            .filter(|b| b.user_id == owner && changed_after(since, b.created_at, b.updated_at))
            .cloned()
            .collect();
        bills.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        Ok(ChangeSet {
            readings,
            bills,
            checkpoint,
        })
    }

    async fn list_readings(&self, owner: Uuid) -> StoreResult<Vec<Reading>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Reading> = tables
            .readings
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
        Ok(rows)
    }

    async fn get_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Reading>> {
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned())
    }

    async fn update_reading(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &ReadingPatch,
    ) -> StoreResult<Option<Reading>> {
        let mut tables = self.tables.write().await;
        let at = self.tick().await;
        let Some(current) = tables.readings.get_mut(&id).filter(|r| r.user_id == owner) else {
            return Ok(None);
        };
        let mut draft = ReadingDraft::from(&*current);
        patch.apply(&mut draft);
        *current = draft.into_reading(owner, current.created_at, at);
        Ok(Some(current.clone()))
    }

    async fn delete_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.readings.get(&id).is_some_and(|r| r.user_id == owner) {
            tables.readings.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_bills(&self, owner: Uuid) -> StoreResult<Vec<Bill>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Bill> = tables
            .bills
            .values()
            .filter(|b| b.user_id == owner)
            .cloned()
            .collect();
        // Descending on Option puts bills without a period last.
        rows.sort_by(|a, b| {
            (&b.billing_period, b.created_at).cmp(&(&a.billing_period, a.created_at))
        });
        Ok(rows)
    }

    async fn get_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Bill>> {
        let tables = self.tables.read().await;
        Ok(tables.bills.get(&id).filter(|b| b.user_id == owner).cloned())
    }

    async fn update_bill(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &BillPatch,
    ) -> StoreResult<Option<Bill>> {
        let mut tables = self.tables.write().await;
        let at = self.tick().await;
        let Some(current) = tables.bills.get_mut(&id).filter(|b| b.user_id == owner) else {
            return Ok(None);
        };
        let mut draft = BillDraft::from(&*current);
        patch.apply(&mut draft);
        *current = draft.into_bill(owner, current.created_at, at);
        Ok(Some(current.clone()))
    }

    async fn delete_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.bills.get(&id).is_some_and(|b| b.user_id == owner) {
            tables.bills.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}
