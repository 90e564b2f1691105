use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::record;
use super::autofill::{parse_working_hours, plan_day_slots};
use super::quota::{refund, week_start};
use super::{Actor, Engine, load_policies, require_admin};
use crate::error::{Error, Result};
use crate::store::Tx;
use crate::types::{
    AuditEvent, Booking, BookingStatus, ExperienceLevel, Slot, SlotChanges, SlotStatus,
};

const AUTOFILL_CAPACITY_TOTAL: u32 = 5;
const AUTOFILL_CAPACITY_EXP: u32 = 3;
const AUTOFILL_CAPACITY_INEXP: u32 = 2;

const SLOT_DELETED_REASON: &str = "Slot deleted by admin";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSlot {
    pub starts_at_utc: DateTime<Utc>,
    pub ends_at_utc: DateTime<Utc>,
    pub capacity_total: u32,
    pub capacity_exp: u32,
    pub capacity_inexp: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookedLifter {
    pub booking_id: String,
    pub lifter_id: String,
    pub name: String,
}

/// A slot with its live per-level occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    #[serde(flatten)]
    pub slot: Slot,
    pub booked_exp: u32,
    pub booked_inexp: u32,
    pub available_exp: u32,
    pub available_inexp: u32,
    pub total_booked: u32,
    pub total_available: u32,
    pub exp_bookings: Vec<BookedLifter>,
    pub inexp_bookings: Vec<BookedLifter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutofillOutcome {
    pub created: u32,
}

/// Booked rows on the slot, split by level as (experienced, inexperienced).
pub(crate) fn booked_by_level(tx: &dyn Tx, slot_id: &str) -> Result<(Vec<Booking>, Vec<Booking>)> {
    Ok(tx
        .list_slot_bookings(slot_id, BookingStatus::Booked)?
        .into_iter()
        .partition(|b| b.level == ExperienceLevel::Experienced))
}

fn count(bookings: &[Booking]) -> u32 {
    u32::try_from(bookings.len()).unwrap_or(u32::MAX)
}

fn fits_total(exp: u32, inexp: u32, total: u32) -> bool {
    exp.checked_add(inexp).is_some_and(|sum| sum <= total)
}

fn booked_lifters(tx: &dyn Tx, bookings: Vec<Booking>) -> Result<Vec<BookedLifter>> {
    bookings
        .into_iter()
        .map(|b| -> Result<BookedLifter> {
            let name = tx
                .get_user(&b.lifter_id)?
                .map_or_else(|| "Unknown".to_string(), |u| u.name);
            Ok(BookedLifter {
                booking_id: b.id,
                lifter_id: b.lifter_id,
                name,
            })
        })
        .collect()
}

impl Engine {
    pub fn create_slot(&self, actor: &Actor, new: &NewSlot) -> Result<Slot> {
        let now = self.now();
        let slot = self.write(|tx| {
            require_admin(tx, actor)?;
            if !fits_total(new.capacity_exp, new.capacity_inexp, new.capacity_total) {
                return Err(Error::validation("Sub-capacities cannot exceed total capacity"));
            }
            if new.starts_at_utc >= new.ends_at_utc {
                return Err(Error::validation("Start time must be before end time"));
            }
            let policies = load_policies(tx)?;

            let slot = Slot {
                id: Uuid::new_v4().to_string(),
                starts_at_utc: new.starts_at_utc,
                ends_at_utc: new.ends_at_utc,
                tz: policies.gym_timezone().name().to_string(),
                capacity_total: new.capacity_total,
                capacity_exp: new.capacity_exp,
                capacity_inexp: new.capacity_inexp,
                status: SlotStatus::Open,
                created_by: actor.user_id.clone(),
                created_at: now,
                updated_at: now,
            };
            tx.create_slot(&slot)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::SlotCreated {
                    slot_id: slot.id.clone(),
                    starts_at_utc: slot.starts_at_utc,
                    ends_at_utc: slot.ends_at_utc,
                    capacity_total: slot.capacity_total,
                    capacity_exp: slot.capacity_exp,
                    capacity_inexp: slot.capacity_inexp,
                },
                now,
            )?;
            Ok(slot)
        })?;

        tracing::info!(slot_id = %slot.id, starts_at = %slot.starts_at_utc, "Slot created");
        Ok(slot)
    }

    /// Applies capacity and status changes. Capacity changes are checked
    /// against the slot's current bookings; status changes are unrestricted.
    pub fn update_slot(&self, actor: &Actor, slot_id: &str, changes: &SlotChanges) -> Result<Slot> {
        let now = self.now();

        let slot = self.write(|tx| {
            require_admin(tx, actor)?;
            let mut slot = tx
                .get_slot(slot_id)?
                .ok_or_else(|| Error::not_found("Slot not found"))?;

            if changes.touches_capacity() {
                let total = changes.capacity_total.unwrap_or(slot.capacity_total);
                let exp = changes.capacity_exp.unwrap_or(slot.capacity_exp);
                let inexp = changes.capacity_inexp.unwrap_or(slot.capacity_inexp);

                if !fits_total(exp, inexp, total) {
                    return Err(Error::conflict("Sub-capacities cannot exceed total capacity"));
                }

                let (booked_exp, booked_inexp) = booked_by_level(tx, &slot.id)?;
                let (booked_exp, booked_inexp) = (count(&booked_exp), count(&booked_inexp));
                if booked_exp > exp || booked_inexp > inexp {
                    return Err(Error::conflict(format!(
                        "Cannot reduce capacity below current bookings ({booked_exp} exp, {booked_inexp} inexp)"
                    )));
                }

                slot.capacity_total = total;
                slot.capacity_exp = exp;
                slot.capacity_inexp = inexp;
            }
            if let Some(status) = changes.status {
                slot.status = status;
            }
            slot.updated_at = now;
            tx.update_slot(&slot)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::SlotUpdated {
                    slot_id: slot.id.clone(),
                    changes: changes.clone(),
                },
                now,
            )?;
            Ok(slot)
        })?;

        tracing::info!(slot_id = %slot.id, status = %slot.status, "Slot updated");
        Ok(slot)
    }

    /// Cancels every live booking on the slot, refunds each lifter against
    /// the slot's own week, then removes the slot. Returns the number of
    /// bookings canceled.
    pub fn delete_slot(&self, actor: &Actor, slot_id: &str) -> Result<u32> {
        let now = self.now();

        let canceled = self.write(|tx| {
            require_admin(tx, actor)?;
            let slot = tx
                .get_slot(slot_id)?
                .ok_or_else(|| Error::not_found("Slot not found"))?;
            let slot_week = week_start(slot.starts_at_utc);

            let mut canceled = 0;
            for mut booking in tx.list_slot_bookings(&slot.id, BookingStatus::Booked)? {
                booking.status = BookingStatus::CanceledByAdmin;
                booking.canceled_at = Some(now);
                booking.cancel_reason = Some(SLOT_DELETED_REASON.to_string());
                tx.update_booking(&booking)?;

                refund(tx, &booking.lifter_id, slot_week)?;
                canceled += 1;
            }

            tx.delete_slot(&slot.id)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::SlotDeleted {
                    slot_id: slot.id.clone(),
                    canceled_bookings: canceled,
                },
                now,
            )?;
            Ok(canceled)
        })?;

        tracing::info!(slot_id, canceled, "Slot deleted");
        Ok(canceled)
    }

    /// Creates one-hour slots for an empty day from the working-hours policy.
    pub fn fill_day_with_default_working_hours(
        &self,
        actor: &Actor,
        day_start_utc: DateTime<Utc>,
    ) -> Result<AutofillOutcome> {
        let now = self.now();

        let outcome = self.write(|tx| {
            require_admin(tx, actor)?;

            let day_end = day_start_utc + Duration::hours(24);
            if !tx.list_slots_starting_between(day_start_utc, day_end)?.is_empty() {
                return Err(Error::conflict(
                    "Day already has slots; only empty days can be auto-filled",
                ));
            }

            let policies = load_policies(tx)?;
            let zone = policies.gym_timezone();
            let raw = policies.default_working_hours().to_string();
            let planned = plan_day_slots(day_start_utc, &parse_working_hours(&raw), zone);

            let mut created = 0;
            for block in &planned {
                tx.create_slot(&Slot {
                    id: Uuid::new_v4().to_string(),
                    starts_at_utc: block.starts_at,
                    ends_at_utc: block.ends_at,
                    tz: zone.name().to_string(),
                    capacity_total: AUTOFILL_CAPACITY_TOTAL,
                    capacity_exp: AUTOFILL_CAPACITY_EXP,
                    capacity_inexp: AUTOFILL_CAPACITY_INEXP,
                    status: SlotStatus::Open,
                    created_by: actor.user_id.clone(),
                    created_at: now,
                    updated_at: now,
                })?;
                created += 1;
            }

            record(
                tx,
                &actor.user_id,
                &AuditEvent::SlotsAutofilledDay {
                    day_start_utc,
                    created,
                    ranges: raw,
                },
                now,
            )?;
            Ok(AutofillOutcome { created })
        })?;

        tracing::info!(day_start = %day_start_utc, created = outcome.created, "Day autofilled");
        Ok(outcome)
    }

    /// Slots starting in `[from, to)` with their occupancy.
    pub fn list_slots(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SlotAvailability>> {
        if from > to {
            return Err(Error::validation("Range start must not be after range end"));
        }

        self.read(|tx| {
            tx.list_slots_starting_between(from, to)?
                .into_iter()
                .map(|slot| -> Result<SlotAvailability> {
                    let (exp, inexp) = booked_by_level(tx, &slot.id)?;
                    let (booked_exp, booked_inexp) = (count(&exp), count(&inexp));
                    let total_booked = booked_exp + booked_inexp;

                    Ok(SlotAvailability {
                        available_exp: slot.capacity_exp.saturating_sub(booked_exp),
                        available_inexp: slot.capacity_inexp.saturating_sub(booked_inexp),
                        total_available: slot.capacity_total.saturating_sub(total_booked),
                        booked_exp,
                        booked_inexp,
                        total_booked,
                        exp_bookings: booked_lifters(tx, exp)?,
                        inexp_bookings: booked_lifters(tx, inexp)?,
                        slot,
                    })
                })
                .collect()
        })
    }
}
