use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    Bill, BillDraft, BillPatch, ChangeSet, Reading, ReadingDraft, ReadingPatch, RecordStore,
    StoreError, StoreResult, User,
};
use crate::config::DbConfig;

const READING_COLUMNS: &str = "id, user_id, date, ground_floor_reading, first_floor_reading, \
     notes, image_url, created_at, updated_at";

const BILL_COLUMNS: &str = "id, user_id, bill_number, billing_period, due_date, amount, \
     units_consumed, paid_date, created_at, updated_at";

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(cfg: &DbConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Writers of one owner share this lock for the rest of their transaction; a
// scan holds it exclusively. A checkpoint read under the exclusive lock is
// later than every committed write and earlier than every pending one.
async fn lock_owner_shared(tx: &mut Transaction<'_, Postgres>, owner: Uuid) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock_shared(hashtextextended($1::text, 0))")
        .bind(owner)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn lock_owner_exclusive(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(owner)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// clock_timestamp() rather than now(): now() is frozen at transaction start,
// before the owner lock was granted.
async fn clock_tx(tx: &mut Transaction<'_, Postgres>) -> StoreResult<OffsetDateTime> {
    let ts = sqlx::query_scalar::<_, OffsetDateTime>("SELECT clock_timestamp()")
        .fetch_one(&mut **tx)
        .await?;
    Ok(ts)
}

async fn upsert_reading_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
    r: &ReadingDraft,
    at: OffsetDateTime,
) -> StoreResult<()> {
    // The WHERE guard turns a cross-owner id collision into "no row returned"
    // instead of silently moving the row to a new owner.
    let applied = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO readings (id, user_id, date, ground_floor_reading, first_floor_reading,
                              notes, image_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        ON CONFLICT (id) DO UPDATE SET
            date = EXCLUDED.date,
            ground_floor_reading = EXCLUDED.ground_floor_reading,
            first_floor_reading = EXCLUDED.first_floor_reading,
            notes = EXCLUDED.notes,
            image_url = EXCLUDED.image_url,
            updated_at = EXCLUDED.updated_at
        WHERE readings.user_id = EXCLUDED.user_id
        RETURNING id
        "#,
    )
    .bind(r.id)
    .bind(owner)
    .bind(r.date)
    .bind(r.ground_floor_reading)
    .bind(r.first_floor_reading)
    .bind(&r.notes)
    .bind(&r.image_url)
    .bind(at)
    .fetch_optional(&mut **tx)
    .await?;

    match applied {
        Some(_) => Ok(()),
        None => Err(StoreError::Conflict(format!(
            "reading {} belongs to another owner",
            r.id
        ))),
    }
}

async fn upsert_bill_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
    b: &BillDraft,
    at: OffsetDateTime,
) -> StoreResult<()> {
    let applied = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO bills (id, user_id, bill_number, billing_period, due_date, amount,
                           units_consumed, paid_date, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        ON CONFLICT (id) DO UPDATE SET
            bill_number = EXCLUDED.bill_number,
            billing_period = EXCLUDED.billing_period,
            due_date = EXCLUDED.due_date,
            amount = EXCLUDED.amount,
            units_consumed = EXCLUDED.units_consumed,
            paid_date = EXCLUDED.paid_date,
            updated_at = EXCLUDED.updated_at
        WHERE bills.user_id = EXCLUDED.user_id
        RETURNING id
        "#,
    )
    .bind(b.id)
    .bind(owner)
    .bind(&b.bill_number)
    .bind(&b.billing_period)
    .bind(b.due_date)
    .bind(b.amount)
    .bind(b.units_consumed)
    .bind(b.paid_date)
    .bind(at)
    .fetch_optional(&mut **tx)
    .await?;

    match applied {
        Some(_) => Ok(()),
        None => Err(StoreError::Conflict(format!(
            "bill {} belongs to another owner",
            b.id
        ))),
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn now(&self) -> StoreResult<OffsetDateTime> {
        let ts = sqlx::query_scalar::<_, OffsetDateTime>("SELECT clock_timestamp()")
            .fetch_one(&self.pool)
            .await?;
        Ok(ts)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, email: &str, at: OffsetDateTime) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("user {email} already exists"))
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn upsert_batch(
        &self,
        owner: Uuid,
        readings: &[ReadingDraft],
        bills: &[BillDraft],
    ) -> StoreResult<OffsetDateTime> {
        let mut tx = self.pool.begin().await?;
        lock_owner_shared(&mut tx, owner).await?;
        let at = clock_tx(&mut tx).await?;
        for r in readings {
            upsert_reading_tx(&mut tx, owner, r, at).await?;
        }
        for b in bills {
            upsert_bill_tx(&mut tx, owner, b, at).await?;
        }
        tx.commit().await?;
        debug!(%owner, readings = readings.len(), bills = bills.len(), "batch upserted");
        Ok(at)
    }

    async fn changes_since(
        &self,
        owner: Uuid,
        since: Option<OffsetDateTime>,
    ) -> StoreResult<ChangeSet> {
        // Stays READ COMMITTED: a REPEATABLE READ snapshot would predate the
        // lock wait. No write of this owner commits while the lock is held.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        lock_owner_exclusive(&mut tx, owner).await?;
        let checkpoint = clock_tx(&mut tx).await?;

        let readings = sqlx::query_as::<_, Reading>(&format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR updated_at > $2 OR created_at > $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(owner)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;

        let bills = sqlx::query_as::<_, Bill>(&format!(
            r#"
            SELECT {BILL_COLUMNS}
            FROM bills
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR updated_at > $2 OR created_at > $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(owner)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ChangeSet {
            readings,
            bills,
            checkpoint,
        })
    }

    async fn list_readings(&self, owner: Uuid) -> StoreResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, Reading>(&format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE user_id = $1
            ORDER BY date DESC, created_at DESC
            "#
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Reading>> {
        let row = sqlx::query_as::<_, Reading>(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_reading(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &ReadingPatch,
    ) -> StoreResult<Option<Reading>> {
        let mut tx = self.pool.begin().await?;
        lock_owner_shared(&mut tx, owner).await?;
        let at = clock_tx(&mut tx).await?;
        let current = sqlx::query_as::<_, Reading>(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        let mut draft = ReadingDraft::from(&current);
        patch.apply(&mut draft);

        let updated = sqlx::query_as::<_, Reading>(&format!(
            r#"
            UPDATE readings
            SET date = $3, ground_floor_reading = $4, first_floor_reading = $5,
                notes = $6, image_url = $7, updated_at = $8
            WHERE id = $1 AND user_id = $2
            RETURNING {READING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(draft.date)
        .bind(draft.ground_floor_reading)
        .bind(draft.first_floor_reading)
        .bind(&draft.notes)
        .bind(&draft.image_url)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM readings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_bills(&self, owner: Uuid) -> StoreResult<Vec<Bill>> {
        let rows = sqlx::query_as::<_, Bill>(&format!(
            r#"
            SELECT {BILL_COLUMNS}
            FROM bills
            WHERE user_id = $1
            ORDER BY billing_period DESC NULLS LAST, created_at DESC
            "#
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Bill>> {
        let row = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_bill(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &BillPatch,
    ) -> StoreResult<Option<Bill>> {
        let mut tx = self.pool.begin().await?;
        lock_owner_shared(&mut tx, owner).await?;
        let at = clock_tx(&mut tx).await?;
        let current = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        let mut draft = BillDraft::from(&current);
        patch.apply(&mut draft);

        let updated = sqlx::query_as::<_, Bill>(&format!(
            r#"
            UPDATE bills
            SET bill_number = $3, billing_period = $4, due_date = $5, amount = $6,
                units_consumed = $7, paid_date = $8, updated_at = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(&draft.bill_number)
        .bind(&draft.billing_period)
        .bind(draft.due_date)
        .bind(draft.amount)
        .bind(draft.units_consumed)
        .bind(draft.paid_date)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM bills WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

// Run with `DATABASE_URL=... cargo test -- --ignored` against a scratch database.
#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use rust_decimal::Decimal;
    use time::{macros::date, Duration};

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::connect(&DbConfig {
            url,
            max_connections: 8,
        })
        .await
        .unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn new_owner(store: &PgStore) -> Uuid {
        let at = store.now().await.unwrap();
        store
            .insert_user(&format!("{}@example.test", Uuid::new_v4()), at)
            .await
            .unwrap()
            .id
    }

    fn reading(id: Uuid, notes: &str) -> ReadingDraft {
        ReadingDraft {
            id,
            date: date!(2023 - 09 - 01),
            ground_floor_reading: 1200,
            first_floor_reading: 600,
            notes: Some(notes.into()),
            image_url: None,
        }
    }

    fn bill(id: Uuid) -> BillDraft {
        BillDraft {
            id,
            bill_number: Some("BILL-2023-001".into()),
            billing_period: Some("2023-08".into()),
            due_date: None,
            amount: Decimal::new(15050, 2),
            units_consumed: 300,
            paid_date: None,
        }
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_email_is_a_conflict() {
        let store = store().await;
        let email = format!("{}@example.test", Uuid::new_v4());
        let at = store.now().await.unwrap();
        store.insert_user(&email, at).await.unwrap();

        let err = store.insert_user(&email, at).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn upsert_replaces_fields_and_keeps_created_at() {
        let store = store().await;
        let owner = new_owner(&store).await;
        let id = Uuid::new_v4();

        let t1 = store.upsert_batch(owner, &[reading(id, "a")], &[]).await.unwrap();
        let t2 = store.upsert_batch(owner, &[reading(id, "b")], &[]).await.unwrap();
        assert!(t2 > t1);

        let r = store.get_reading(owner, id).await.unwrap().unwrap();
        assert_eq!(r.notes.as_deref(), Some("b"));
        assert_eq!(r.created_at, t1);
        assert_eq!(r.updated_at, t2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn foreign_id_aborts_the_whole_batch() {
        let store = store().await;
        let (alice, bob) = (new_owner(&store).await, new_owner(&store).await);
        let taken = Uuid::new_v4();
        store.upsert_batch(alice, &[], &[bill(taken)]).await.unwrap();

        let fresh = Uuid::new_v4();
        let err = store
            .upsert_batch(bob, &[reading(fresh, "x")], &[bill(taken)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
        assert!(store.get_reading(bob, fresh).await.unwrap().is_none());
        assert_eq!(store.get_bill(alice, taken).await.unwrap().unwrap().user_id, alice);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn scan_filter_is_strict_and_disjunctive() {
        let store = store().await;
        let owner = new_owner(&store).await;

        let at = store.upsert_batch(owner, &[reading(Uuid::new_v4(), "a")], &[]).await.unwrap();
        let all = store.changes_since(owner, None).await.unwrap();
        assert_eq!(all.readings.len(), 1);
        assert!(all.checkpoint > at);
        assert!(store.changes_since(owner, Some(at)).await.unwrap().readings.is_empty());

        // Inserted by other tooling with a stale updated_at.
        let since = all.checkpoint;
        let imported = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO readings (id, user_id, date, ground_floor_reading, first_floor_reading,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, 1, 1, $4, $5)
            "#,
        )
        .bind(imported)
        .bind(owner)
        .bind(date!(2023 - 10 - 01))
        .bind(since + Duration::seconds(5))
        .bind(since - Duration::seconds(5))
        .execute(&store.pool)
        .await
        .unwrap();

        let changes = store.changes_since(owner, Some(since)).await.unwrap();
        assert_eq!(changes.readings.len(), 1);
        assert_eq!(changes.readings[0].id, imported);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn chained_pulls_see_every_concurrent_write() {
        let store = store().await;
        let owner = new_owner(&store).await;

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    for _ in 0..20 {
                        let id = Uuid::new_v4();
                        store.upsert_batch(owner, &[reading(id, "w")], &[]).await.unwrap();
                        ids.push(id);
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut since = None;
        while writers.iter().any(|w| !w.is_finished()) {
            let changes = store.changes_since(owner, since).await.unwrap();
            seen.extend(changes.readings.iter().map(|r| r.id));
            since = Some(changes.checkpoint);
        }
        let mut written = HashSet::new();
        for w in writers {
            written.extend(w.await.unwrap());
        }
        let last = store.changes_since(owner, since).await.unwrap();
        seen.extend(last.readings.iter().map(|r| r.id));

        assert_eq!(seen, written);
    }
}
