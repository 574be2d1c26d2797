use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::store::{Bill, BillDraft, BillPatch};
use crate::validate::{self, nullable, ValidationError, BILL_NUMBER_MAX_LEN};

/// Bill as sent by a client. `amount` is a fixed-point string such as `"180.00"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub bill_number: Option<String>,
    #[serde(default)]
    pub billing_period: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    pub amount: String,
    pub units_consumed: i32,
    #[serde(default)]
    pub paid_date: Option<String>,
}

impl BillInput {
    pub fn into_draft(self, path: &str) -> Result<BillDraft, ValidationError> {
        Ok(BillDraft {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            bill_number: validate::check_max_len(
                &format!("{path}billNumber"),
                self.bill_number,
                BILL_NUMBER_MAX_LEN,
            )?,
            billing_period: validate::check_billing_period(
                &format!("{path}billingPeriod"),
                self.billing_period,
            )?,
            due_date: validate::parse_optional_date(
                &format!("{path}dueDate"),
                self.due_date.as_deref(),
            )?,
            amount: validate::parse_amount(&format!("{path}amount"), &self.amount)?,
            units_consumed: self.units_consumed,
            paid_date: validate::parse_optional_date(
                &format!("{path}paidDate"),
                self.paid_date.as_deref(),
            )?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPatchInput {
    #[serde(default, deserialize_with = "nullable")]
    pub bill_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub billing_period: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub units_consumed: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub paid_date: Option<Option<String>>,
}

impl BillPatchInput {
    pub fn into_patch(self) -> Result<BillPatch, ValidationError> {
        Ok(BillPatch {
            bill_number: self
                .bill_number
                .map(|v| validate::check_max_len("billNumber", v, BILL_NUMBER_MAX_LEN))
                .transpose()?,
            billing_period: self
                .billing_period
                .map(|v| validate::check_billing_period("billingPeriod", v))
                .transpose()?,
            due_date: self
                .due_date
                .map(|v| validate::parse_optional_date("dueDate", v.as_deref()))
                .transpose()?,
            amount: self
                .amount
                .map(|a| validate::parse_amount("amount", &a))
                .transpose()?,
            units_consumed: self.units_consumed,
            paid_date: self
                .paid_date
                .map(|v| validate::parse_optional_date("paidDate", v.as_deref()))
                .transpose()?,
        })
    }
}

/// Bill as returned to clients, with `isPaid` derived from `paidDate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bill_number: Option<String>,
    pub billing_period: Option<String>,
    #[serde(with = "validate::iso_date::option")]
    pub due_date: Option<Date>,
    pub amount: Decimal,
    pub units_consumed: i32,
    #[serde(with = "validate::iso_date::option")]
    pub paid_date: Option<Date>,
    pub is_paid: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Bill> for BillView {
    fn from(b: Bill) -> Self {
        Self {
            is_paid: b.is_paid(),
            id: b.id,
            user_id: b.user_id,
            bill_number: b.bill_number,
            billing_period: b.billing_period,
            due_date: b.due_date,
            amount: b.amount,
            units_consumed: b.units_consumed,
            paid_date: b.paid_date,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}
