use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountStatus, ExperienceLevel, Role, SlotChanges, SlotStatus};

#[derive(Debug, Deserialize)]
pub struct SetupProfileRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertPolicyRequest {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSlotRequest {
    #[serde(default)]
    pub capacity_total: Option<u32>,
    #[serde(default)]
    pub capacity_exp: Option<u32>,
    #[serde(default)]
    pub capacity_inexp: Option<u32>,
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

impl From<UpdateSlotRequest> for SlotChanges {
    fn from(req: UpdateSlotRequest) -> Self {
        SlotChanges {
            capacity_total: req.capacity_total,
            capacity_exp: req.capacity_exp,
            capacity_inexp: req.capacity_inexp,
            status: req.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSlotResponse {
    pub canceled_bookings: u32,
}

#[derive(Debug, Deserialize)]
pub struct AutofillRequest {
    pub day_start_utc: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BookSlotRequest {
    pub slot_id: String,
}

/// Response carrying only the id of a created record.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    /// Audit sequence number of the last entry on the previous page.
    #[serde(default)]
    pub cursor: Option<i64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    pub year: i32,
    pub month: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_slot_update() {
        let req: UpdateSlotRequest = serde_json::from_str(r#"{"status":"closed"}"#).unwrap();
        let changes = SlotChanges::from(req);
        assert_eq!(changes.status, Some(SlotStatus::Closed));
        assert!(!changes.touches_capacity());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<UpdateUserStatusRequest, _> = serde_json::from_str(r#"{"status":"banned"}"#);
        assert!(result.is_err());
    }
}
