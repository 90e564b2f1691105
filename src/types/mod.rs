mod audit;
mod enums;
mod models;

pub use audit::{AuditEvent, CanceledBy, SlotChanges};
pub use enums::{AccountStatus, BookingStatus, ExperienceLevel, Role, SlotStatus};
pub use models::*;
