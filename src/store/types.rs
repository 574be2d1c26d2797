use rust_decimal::Decimal;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Reading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub ground_floor_reading: i32,
    pub first_floor_reading: i32,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Reading {
    /// Sum of both meters. Widened so two large i32 readings cannot overflow.
    pub fn total_consumption(&self) -> i64 {
        i64::from(self.ground_floor_reading) + i64::from(self.first_floor_reading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bill_number: Option<String>,
    pub billing_period: Option<String>,
    pub due_date: Option<Date>,
    pub amount: Decimal,
    pub units_consumed: i32,
    pub paid_date: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Bill {
    pub fn is_paid(&self) -> bool {
        self.paid_date.is_some()
    }
}

/// Validated mutable attributes of a reading, ready to be upserted under an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingDraft {
    pub id: Uuid,
    pub date: Date,
    pub ground_floor_reading: i32,
    pub first_floor_reading: i32,
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

impl ReadingDraft {
    pub fn into_reading(
        self,
        user_id: Uuid,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> Reading {
        Reading {
            id: self.id,
            user_id,
            date: self.date,
            ground_floor_reading: self.ground_floor_reading,
            first_floor_reading: self.first_floor_reading,
            notes: self.notes,
            image_url: self.image_url,
            created_at,
            updated_at,
        }
    }
}

impl From<&Reading> for ReadingDraft {
    fn from(r: &Reading) -> Self {
        Self {
            id: r.id,
            date: r.date,
            ground_floor_reading: r.ground_floor_reading,
            first_floor_reading: r.first_floor_reading,
            notes: r.notes.clone(),
            image_url: r.image_url.clone(),
        }
    }
}

/// Validated mutable attributes of a bill, ready to be upserted under an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillDraft {
    pub id: Uuid,
    pub bill_number: Option<String>,
    pub billing_period: Option<String>,
    pub due_date: Option<Date>,
    pub amount: Decimal,
    pub units_consumed: i32,
    pub paid_date: Option<Date>,
}

impl BillDraft {
    pub fn into_bill(
        self,
        user_id: Uuid,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> Bill {
        Bill {
            id: self.id,
            user_id,
            bill_number: self.bill_number,
            billing_period: self.billing_period,
            due_date: self.due_date,
            amount: self.amount,
            units_consumed: self.units_consumed,
            paid_date: self.paid_date,
            created_at,
            updated_at,
        }
    }
}

impl From<&Bill> for BillDraft {
    fn from(b: &Bill) -> Self {
        Self {
            id: b.id,
            bill_number: b.bill_number.clone(),
            billing_period: b.billing_period.clone(),
            due_date: b.due_date,
            amount: b.amount,
            units_consumed: b.units_consumed,
            paid_date: b.paid_date,
        }
    }
}

/// Partial update of a reading. `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingPatch {
    pub date: Option<Date>,
    pub ground_floor_reading: Option<i32>,
    pub first_floor_reading: Option<i32>,
    pub notes: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

impl ReadingPatch {
    pub fn apply(&self, draft: &mut ReadingDraft) {
        if let Some(date) = self.date {
            draft.date = date;
        }
        if let Some(v) = self.ground_floor_reading {
            draft.ground_floor_reading = v;
        }
        if let Some(v) = self.first_floor_reading {
            draft.first_floor_reading = v;
        }
        if let Some(notes) = &self.notes {
            draft.notes = notes.clone();
        }
        if let Some(url) = &self.image_url {
            draft.image_url = url.clone();
        }
    }
}

/// Partial update of a bill, same conventions as [`ReadingPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillPatch {
    pub bill_number: Option<Option<String>>,
    pub billing_period: Option<Option<String>>,
    pub due_date: Option<Option<Date>>,
    pub amount: Option<Decimal>,
    pub units_consumed: Option<i32>,
    pub paid_date: Option<Option<Date>>,
}

impl BillPatch {
    pub fn apply(&self, draft: &mut BillDraft) {
        if let Some(v) = &self.bill_number {
            draft.bill_number = v.clone();
        }
        if let Some(v) = &self.billing_period {
            draft.billing_period = v.clone();
        }
        if let Some(v) = self.due_date {
            draft.due_date = v;
        }
        if let Some(v) = self.amount {
            draft.amount = v;
        }
        if let Some(v) = self.units_consumed {
            draft.units_consumed = v;
        }
        if let Some(v) = self.paid_date {
            draft.paid_date = v;
        }
    }
}

/// Rows of one owner that changed after a checkpoint, with the checkpoint
/// to resume from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub readings: Vec<Reading>,
    pub bills: Vec<Bill>,
    pub checkpoint: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn reading() -> Reading {
        ReadingDraft {
            id: Uuid::new_v4(),
            date: date!(2023 - 08 - 01),
            ground_floor_reading: 1000,
            first_floor_reading: 500,
            notes: Some("Initial reading".into()),
            image_url: None,
        }
        .into_reading(
            Uuid::new_v4(),
            datetime!(2023-08-01 10:00 UTC),
            datetime!(2023-08-01 10:00 UTC),
        )
    }

    #[test]
    fn total_consumption_is_derived_and_widened() {
        let mut r = reading();
        assert_eq!(r.total_consumption(), 1500);

        r.ground_floor_reading = i32::MAX;
        r.first_floor_reading = i32::MAX;
        assert_eq!(r.total_consumption(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn reading_patch_keeps_absent_fields_and_clears_explicit_nulls() {
        let r = reading();
        let mut draft = ReadingDraft::from(&r);
        let patch = ReadingPatch {
            first_floor_reading: Some(650),
            notes: Some(None),
            ..Default::default()
        };
        patch.apply(&mut draft);

        assert_eq!(draft.date, r.date);
        assert_eq!(draft.ground_floor_reading, 1000);
        assert_eq!(draft.first_floor_reading, 650);
        assert_eq!(draft.notes, None);
    }

    #[test]
    fn bill_paid_status_follows_paid_date() {
        let draft = BillDraft {
            id: Uuid::new_v4(),
            bill_number: Some("BILL-2023-002".into()),
            billing_period: Some("2023-09".into()),
            due_date: Some(date!(2023 - 10 - 15)),
            amount: Decimal::new(18000, 2),
            units_consumed: 350,
            paid_date: None,
        };
        let mut bill = draft.clone().into_bill(
            Uuid::new_v4(),
            datetime!(2023-09-01 0:00 UTC),
            datetime!(2023-09-01 0:00 UTC),
        );
        assert!(!bill.is_paid());

        let mut d = BillDraft::from(&bill);
        BillPatch {
            paid_date: Some(Some(date!(2023 - 10 - 10))),
            ..Default::default()
        }
        .apply(&mut d);
        bill.paid_date = d.paid_date;
        assert!(bill.is_paid());
    }
}
