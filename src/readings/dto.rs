use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::store::{Reading, ReadingDraft, ReadingPatch};
use crate::validate::{self, nullable, ValidationError};

/// Reading as sent by a client. `createdAt`/`updatedAt` and derived fields
/// are ignored if present; `userId` is accepted but never trusted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub date: String,
    pub ground_floor_reading: i32,
    pub first_floor_reading: i32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ReadingInput {
    /// Validates the input; `path` prefixes field names in errors.
    /// A missing id is replaced by a fresh v4 UUID.
    pub fn into_draft(self, path: &str) -> Result<ReadingDraft, ValidationError> {
        Ok(ReadingDraft {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            date: validate::parse_date(&format!("{path}date"), &self.date)?,
            ground_floor_reading: self.ground_floor_reading,
            first_floor_reading: self.first_floor_reading,
            notes: self.notes,
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPatchInput {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub ground_floor_reading: Option<i32>,
    #[serde(default)]
    pub first_floor_reading: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
}

impl ReadingPatchInput {
    pub fn into_patch(self) -> Result<ReadingPatch, ValidationError> {
        Ok(ReadingPatch {
            date: self
                .date
                .map(|d| validate::parse_date("date", &d))
                .transpose()?,
            ground_floor_reading: self.ground_floor_reading,
            first_floor_reading: self.first_floor_reading,
            notes: self.notes,
            image_url: self.image_url,
        })
    }
}

/// Reading as returned to clients, with `totalConsumption` derived on the fly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingView {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "validate::iso_date")]
    pub date: Date,
    pub ground_floor_reading: i32,
    pub first_floor_reading: i32,
    pub total_consumption: i64,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Reading> for ReadingView {
    fn from(r: Reading) -> Self {
        Self {
            total_consumption: r.total_consumption(),
            id: r.id,
            user_id: r.user_id,
            date: r.date,
            ground_floor_reading: r.ground_floor_reading,
            first_floor_reading: r.first_floor_reading,
            notes: r.notes,
            image_url: r.image_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::{date, datetime};

    #[test]
    fn input_ignores_client_metadata() {
        let input: ReadingInput = serde_json::from_value(json!({
            "userId": "00000000-0000-0000-0000-000000000001",
            "date": "2023-08-01",
            "groundFloorReading": 1000,
            "firstFloorReading": 500,
            "totalConsumption": 99,
            "createdAt": "2020-01-01T00:00:00Z"
        }))
        .unwrap();

        let draft = input.into_draft("readings[0].").unwrap();
        assert_eq!(draft.date, date!(2023 - 08 - 01));
        assert_eq!(draft.notes, None);
    }

    #[test]
    fn bad_date_names_the_record() {
        let input: ReadingInput = serde_json::from_value(json!({
            "date": "01/08/2023",
            "groundFloorReading": 1,
            "firstFloorReading": 2
        }))
        .unwrap();

        let err = input.into_draft("readings[3].").unwrap_err();
        assert_eq!(err.field, "readings[3].date");
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: ReadingPatchInput =
            serde_json::from_value(json!({ "notes": null, "firstFloorReading": 7 })).unwrap();
        let patch = patch.into_patch().unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.image_url, None);
        assert_eq!(patch.first_floor_reading, Some(7));
    }

    #[test]
    fn view_serializes_wire_shape() {
        let reading = Reading {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            date: date!(2023 - 09 - 01),
            ground_floor_reading: 1200,
            first_floor_reading: 600,
            notes: None,
            image_url: None,
            created_at: datetime!(2023-09-01 12:00 UTC),
            updated_at: datetime!(2023-09-01 12:30 UTC),
        };

        let v = serde_json::to_value(ReadingView::from(reading)).unwrap();
        assert_eq!(v["date"], "2023-09-01");
        assert_eq!(v["totalConsumption"], 1800);
        assert_eq!(v["updatedAt"], "2023-09-01T12:30:00Z");
        assert!(v["notes"].is_null());
    }
}
