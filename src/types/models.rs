use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountStatus, BookingStatus, ExperienceLevel, Role, SlotStatus};

/// Identity record owned by the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    pub weekly_quota: u32,
    pub status: AccountStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub starts_at_utc: DateTime<Utc>,
    pub ends_at_utc: DateTime<Utc>,
    /// Gym timezone at creation time; display only.
    pub tz: String,
    pub capacity_total: u32,
    pub capacity_exp: u32,
    pub capacity_inexp: u32,
    pub status: SlotStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    #[must_use]
    pub fn capacity_for(&self, level: ExperienceLevel) -> u32 {
        match level {
            ExperienceLevel::Experienced => self.capacity_exp,
            ExperienceLevel::Inexperienced => self.capacity_inexp,
        }
    }

    /// Half-open interval intersection; touching endpoints do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.starts_at_utc < other.ends_at_utc && other.starts_at_utc < self.ends_at_utc
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub lifter_id: String,
    pub slot_id: String,
    /// Level at booking time, never re-derived from the profile.
    pub level: ExperienceLevel,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub id: String,
    pub lifter_id: String,
    pub week_start_utc: DateTime<Utc>,
    pub week_end_utc: DateTime<Utc>,
    /// Snapshot of the profile quota when the window was opened.
    pub quota: u32,
    pub used: u32,
}

impl QuotaWindow {
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.quota.saturating_sub(self.used)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    /// Monotonic insertion order, used as the pagination cursor.
    pub seq: i64,
    pub actor_user_id: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

/// A booking together with its slot, which is gone once the slot is deleted.
#[derive(Debug, Clone, Serialize)]
pub struct BookingWithSlot {
    #[serde(flatten)]
    pub booking: Booking,
    pub slot: Option<Slot>,
}
