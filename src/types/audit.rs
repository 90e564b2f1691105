use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AccountStatus, ExperienceLevel, Role, SlotStatus};

/// Who initiated a booking cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanceledBy {
    Lifter,
    Admin,
}

/// Fields changed by a slot update. Absent fields were left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_exp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_inexp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SlotStatus>,
}

impl SlotChanges {
    #[must_use]
    pub fn touches_capacity(&self) -> bool {
        self.capacity_total.is_some() || self.capacity_exp.is_some() || self.capacity_inexp.is_some()
    }
}

/// One variant per audited action. Only the payload fields are serialized;
/// the action, entity and entity id go to their own columns.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditEvent {
    SlotCreated {
        #[serde(skip)]
        slot_id: String,
        starts_at_utc: DateTime<Utc>,
        ends_at_utc: DateTime<Utc>,
        capacity_total: u32,
        capacity_exp: u32,
        capacity_inexp: u32,
    },
    SlotUpdated {
        #[serde(skip)]
        slot_id: String,
        #[serde(flatten)]
        changes: SlotChanges,
    },
    SlotDeleted {
        #[serde(skip)]
        slot_id: String,
        canceled_bookings: u32,
    },
    SlotsAutofilledDay {
        day_start_utc: DateTime<Utc>,
        created: u32,
        ranges: String,
    },
    BookingCreated {
        #[serde(skip)]
        booking_id: String,
        slot_id: String,
        level: ExperienceLevel,
    },
    BookingCanceled {
        #[serde(skip)]
        booking_id: String,
        canceled_by: CanceledBy,
        within_cutoff: bool,
        refunded: bool,
    },
    BookingNoShow {
        #[serde(skip)]
        booking_id: String,
    },
    BookingAttended {
        #[serde(skip)]
        booking_id: String,
    },
    PolicyUpdated {
        key: String,
        value: String,
    },
    UserProfileCreated {
        #[serde(skip)]
        user_id: String,
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        experience_level: Option<ExperienceLevel>,
    },
    UserStatusUpdated {
        #[serde(skip)]
        user_id: String,
        status: AccountStatus,
    },
}

impl AuditEvent {
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            AuditEvent::SlotCreated { .. } => "slot_created",
            AuditEvent::SlotUpdated { .. } => "slot_updated",
            AuditEvent::SlotDeleted { .. } => "slot_deleted",
            AuditEvent::SlotsAutofilledDay { .. } => "slots_autofilled_day",
            AuditEvent::BookingCreated { .. } => "booking_created",
            AuditEvent::BookingCanceled { .. } => "booking_canceled",
            AuditEvent::BookingNoShow { .. } => "booking_no_show",
            AuditEvent::BookingAttended { .. } => "booking_attended",
            AuditEvent::PolicyUpdated { .. } => "policy_updated",
            AuditEvent::UserProfileCreated { .. } => "user_profile_created",
            AuditEvent::UserStatusUpdated { .. } => "user_status_updated",
        }
    }

    #[must_use]
    pub fn entity(&self) -> &'static str {
        match self {
            AuditEvent::SlotCreated { .. }
            | AuditEvent::SlotUpdated { .. }
            | AuditEvent::SlotDeleted { .. }
            | AuditEvent::SlotsAutofilledDay { .. } => "slots",
            AuditEvent::BookingCreated { .. }
            | AuditEvent::BookingCanceled { .. }
            | AuditEvent::BookingNoShow { .. }
            | AuditEvent::BookingAttended { .. } => "bookings",
            AuditEvent::PolicyUpdated { .. } => "policies",
            AuditEvent::UserProfileCreated { .. } | AuditEvent::UserStatusUpdated { .. } => {
                "user_profiles"
            }
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> String {
        match self {
            AuditEvent::SlotCreated { slot_id, .. }
            | AuditEvent::SlotUpdated { slot_id, .. }
            | AuditEvent::SlotDeleted { slot_id, .. } => slot_id.clone(),
            AuditEvent::SlotsAutofilledDay { day_start_utc, .. } => {
                format!("day_{}", day_start_utc.timestamp_millis())
            }
            AuditEvent::BookingCreated { booking_id, .. }
            | AuditEvent::BookingCanceled { booking_id, .. }
            | AuditEvent::BookingNoShow { booking_id }
            | AuditEvent::BookingAttended { booking_id } => booking_id.clone(),
            AuditEvent::PolicyUpdated { key, .. } => key.clone(),
            AuditEvent::UserProfileCreated { user_id, .. }
            | AuditEvent::UserStatusUpdated { user_id, .. } => user_id.clone(),
        }
    }

    /// JSON payload for the audit row, or `None` when the event carries no fields.
    pub fn payload(&self) -> serde_json::Result<Option<serde_json::Value>> {
        let value = serde_json::to_value(self)?;
        Ok(match value {
            serde_json::Value::Object(map) if map.is_empty() => None,
            serde_json::Value::Null => None,
            other => Some(other),
        })
    }
}
