use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::bills::dto::{BillInput, BillView};
use crate::readings::dto::{ReadingInput, ReadingView};

/// Body of `POST /sync/push`. A missing array is an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub readings: Vec<ReadingInput>,
    #[serde(default)]
    pub bills: Vec<BillInput>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    pub since: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PullResponse {
    pub readings: Vec<ReadingView>,
    pub bills: Vec<BillView>,
    /// Checkpoint to send as `since` on the next pull.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
