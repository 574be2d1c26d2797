//! Record store: durable home of users, readings and bills.
//!
//! Every reader and writer in the crate goes through [`RecordStore`]. The
//! production implementation is [`PgStore`]; [`MemoryStore`] keeps the same
//! semantics in process and backs the test suite.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

mod memory;
mod postgres;
mod types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::{
    Bill, BillDraft, BillPatch, ChangeSet, Reading, ReadingDraft, ReadingPatch, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or ownership constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store kept failing in a way a retry was expected to fix.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current time on the store's clock. Reconciliation times and pull
    /// checkpoints are read from the same clock so they are comparable.
    async fn now(&self) -> StoreResult<OffsetDateTime>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with [`StoreError::Conflict`] when the email is already taken.
    async fn insert_user(&self, email: &str, at: OffsetDateTime) -> StoreResult<User>;

    /// Upserts all readings, then all bills, as one atomic unit, and returns
    /// the reconciliation time `at` stamped on every row.
    ///
    /// Existing rows of the same owner are fully replaced and keep their
    /// `created_at`; new rows get `created_at = updated_at = at`. A row id that
    /// belongs to another owner aborts the whole batch with a conflict.
    ///
    /// `at` is read while the owner's writes are serialized against
    /// [`RecordStore::changes_since`]: once a checkpoint later than `at`
    /// exists, the batch is visible to the scan that produced it.
    async fn upsert_batch(
        &self,
        owner: Uuid,
        readings: &[ReadingDraft],
        bills: &[BillDraft],
    ) -> StoreResult<OffsetDateTime>;

    /// Rows of `owner` with `updated_at > since OR created_at > since`, or
    /// all of them when `since` is `None`. Ordered by `created_at`, then `id`.
    ///
    /// The returned checkpoint is read after in-flight writes of `owner` have
    /// finished and before any later write is stamped, so every row missing
    /// from the set carries a newer `updated_at`.
    async fn changes_since(
        &self,
        owner: Uuid,
        since: Option<OffsetDateTime>,
    ) -> StoreResult<ChangeSet>;

    /// Newest reading date first.
    async fn list_readings(&self, owner: Uuid) -> StoreResult<Vec<Reading>>;
    async fn get_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Reading>>;
    async fn update_reading(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &ReadingPatch,
    ) -> StoreResult<Option<Reading>>;
    async fn delete_reading(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Newest billing period first, bills without a period last.
    async fn list_bills(&self, owner: Uuid) -> StoreResult<Vec<Bill>>;
    async fn get_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Bill>>;
    async fn update_bill(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &BillPatch,
    ) -> StoreResult<Option<Bill>>;
    async fn delete_bill(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
}
