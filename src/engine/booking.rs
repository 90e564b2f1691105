use chrono::Duration;
use uuid::Uuid;

use super::audit::record;
use super::quota::{get_or_create_window, refund, week_start};
use super::{Actor, Engine, load_policies, require_admin, require_lifter};
use crate::error::{Error, Result};
use crate::store::Tx;
use crate::types::{
    AccountStatus, AuditEvent, Booking, BookingStatus, BookingWithSlot, CanceledBy, Role, Slot,
    SlotStatus,
};

const MY_BOOKINGS_LIMIT: u32 = 50;

fn load_booking(tx: &dyn Tx, booking_id: &str) -> Result<Booking> {
    tx.get_booking(booking_id)?
        .ok_or_else(|| Error::not_found("Booking not found"))
}

fn load_slot(tx: &dyn Tx, slot_id: &str) -> Result<Slot> {
    tx.get_slot(slot_id)?
        .ok_or_else(|| Error::not_found("Slot not found"))
}

impl Engine {
    /// Books the slot for the calling lifter and returns the booking id.
    ///
    /// Checks run in a fixed order and the first failure wins: the lifter's
    /// profile, the slot's existence and status, that it starts in the
    /// future, overlap with the lifter's live bookings, the weekly quota,
    /// capacity at the lifter's level, and the cap on future bookings.
    pub fn book_slot(&self, actor: &Actor, slot_id: &str) -> Result<String> {
        let now = self.now();

        let booking = self
            .write(|tx| {
                let profile = tx
                    .get_profile(&actor.user_id)?
                    .filter(|p| p.role == Role::Lifter && p.status == AccountStatus::Active)
                    .ok_or_else(|| Error::authorization("Not authorized or account frozen"))?;
                let level = profile
                    .experience_level
                    .ok_or_else(|| Error::validation("Experience level not set"))?;

                let slot = load_slot(tx, slot_id)?;
                if slot.status != SlotStatus::Open {
                    return Err(Error::conflict("Slot not available"));
                }
                if slot.starts_at_utc <= now {
                    return Err(Error::policy("Cannot book past slots"));
                }

                let mut held = Vec::new();
                let live = tx.list_lifter_bookings(&profile.user_id, Some(BookingStatus::Booked), None)?;
                for existing in live {
                    if let Some(existing_slot) = tx.get_slot(&existing.slot_id)? {
                        held.push(existing_slot);
                    }
                }
                if held.iter().any(|s| s.overlaps(&slot)) {
                    return Err(Error::conflict("You have an overlapping booking"));
                }

                let window = get_or_create_window(tx, &profile, week_start(now))?;
                if window.used >= window.quota {
                    return Err(Error::conflict("Weekly quota exceeded"));
                }

                let booked_at_level = tx
                    .list_slot_bookings(&slot.id, BookingStatus::Booked)?
                    .iter()
                    .filter(|b| b.level == level)
                    .count();
                if booked_at_level >= slot.capacity_for(level) as usize {
                    return Err(Error::conflict(format!("No {level} slots available")));
                }

                let max_future = load_policies(tx)?.max_future_bookings();
                let future = held.iter().filter(|s| s.starts_at_utc > now).count();
                if future >= max_future as usize {
                    return Err(Error::conflict("Maximum future bookings exceeded"));
                }

                let booking = Booking {
                    id: Uuid::new_v4().to_string(),
                    lifter_id: profile.user_id.clone(),
                    slot_id: slot.id.clone(),
                    level,
                    status: BookingStatus::Booked,
                    created_at: now,
                    canceled_at: None,
                    cancel_reason: None,
                };
                tx.create_booking(&booking)?;
                tx.increment_quota_used(&window.id)?;

                record(
                    tx,
                    &actor.user_id,
                    &AuditEvent::BookingCreated {
                        booking_id: booking.id.clone(),
                        slot_id: booking.slot_id.clone(),
                        level,
                    },
                    now,
                )?;
                Ok(booking)
            })
            .inspect_err(|e| {
                if e.is_user_facing() {
                    tracing::debug!(lifter_id = %actor.user_id, slot_id, "Booking rejected: {e}");
                }
            })?;

        tracing::info!(booking_id = %booking.id, slot_id, lifter_id = %booking.lifter_id, "Booking created");
        Ok(booking.id)
    }

    /// Cancels a booking as its owner or as an admin.
    ///
    /// Owners must cancel before the cutoff; admins are exempt. The quota
    /// unit is refunded on the booking's creation week unless an owner
    /// cancels late.
    pub fn cancel_booking(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        let now = self.now();

        let booking = self.write(|tx| {
            let mut booking = load_booking(tx, booking_id)?;
            let actor_profile = tx
                .get_profile(&actor.user_id)?
                .ok_or_else(|| Error::not_found("User profile not found"))?;

            let is_owner = booking.lifter_id == actor.user_id;
            if !is_owner && actor_profile.role != Role::Admin {
                return Err(Error::authorization("Not authorized"));
            }

            let next = if is_owner {
                BookingStatus::CanceledByLifter
            } else {
                BookingStatus::CanceledByAdmin
            };
            if !booking.status.can_transition_to(next) {
                return Err(Error::conflict("Booking cannot be canceled"));
            }

            let slot = load_slot(tx, &booking.slot_id)?;
            let cutoff_hours = load_policies(tx)?.cancellation_cutoff_hours();
            let cutoff = slot.starts_at_utc - Duration::hours(cutoff_hours);
            let within_cutoff = now <= cutoff;

            if is_owner && !within_cutoff {
                return Err(Error::policy(format!(
                    "Cannot cancel within {cutoff_hours} hours of slot start"
                )));
            }

            booking.status = next;
            booking.canceled_at = Some(now);
            tx.update_booking(&booking)?;

            let refunded = refund(tx, &booking.lifter_id, week_start(booking.created_at))?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::BookingCanceled {
                    booking_id: booking.id.clone(),
                    canceled_by: if is_owner {
                        CanceledBy::Lifter
                    } else {
                        CanceledBy::Admin
                    },
                    within_cutoff,
                    refunded,
                },
                now,
            )?;
            Ok(booking)
        })?;

        tracing::info!(booking_id, status = %booking.status, "Booking canceled");
        Ok(booking)
    }

    /// Marks a booking as a no-show once its slot has ended. The quota unit is kept.
    pub fn mark_no_show(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        let now = self.now();

        let booking = self.write(|tx| {
            require_admin(tx, actor)?;
            let mut booking = load_booking(tx, booking_id)?;
            if !booking.status.can_transition_to(BookingStatus::NoShow) {
                return Err(Error::conflict("Can only mark booked sessions as no-show"));
            }

            let slot = load_slot(tx, &booking.slot_id)?;
            if now < slot.ends_at_utc {
                return Err(Error::policy("Cannot mark no-show before slot ends"));
            }

            booking.status = BookingStatus::NoShow;
            tx.update_booking(&booking)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::BookingNoShow {
                    booking_id: booking.id.clone(),
                },
                now,
            )?;
            Ok(booking)
        })?;

        tracing::info!(booking_id, "Booking marked no-show");
        Ok(booking)
    }

    /// Marks a booking as attended once its slot has started. The quota unit is kept.
    pub fn mark_attended(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        let now = self.now();

        let booking = self.write(|tx| {
            require_admin(tx, actor)?;
            let mut booking = load_booking(tx, booking_id)?;
            if !booking.status.can_transition_to(BookingStatus::Attended) {
                return Err(Error::conflict("Can only mark booked sessions as attended"));
            }

            let slot = load_slot(tx, &booking.slot_id)?;
            if now < slot.starts_at_utc {
                return Err(Error::policy("Cannot mark attended before slot starts"));
            }

            booking.status = BookingStatus::Attended;
            tx.update_booking(&booking)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::BookingAttended {
                    booking_id: booking.id.clone(),
                },
                now,
            )?;
            Ok(booking)
        })?;

        tracing::info!(booking_id, "Booking marked attended");
        Ok(booking)
    }

    /// The caller's most recent bookings, newest first, with their slots.
    pub fn list_my_bookings(&self, actor: &Actor) -> Result<Vec<BookingWithSlot>> {
        self.read(|tx| {
            let profile = require_lifter(tx, actor)?;

            tx.list_lifter_bookings(&profile.user_id, None, Some(MY_BOOKINGS_LIMIT))?
                .into_iter()
                .map(|booking| -> Result<BookingWithSlot> {
                    let slot = tx.get_slot(&booking.slot_id)?;
                    Ok(BookingWithSlot { booking, slot })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::{DateTime, Datelike, TimeZone, Utc};

    use super::super::slots::NewSlot;
    use super::super::testing::Fixture;
    use super::*;
    use crate::types::{ExperienceLevel, SlotChanges};

    fn add_slot(fx: &Fixture, start: DateTime<Utc>, minutes: i64, exp: u32, inexp: u32) -> Slot {
        fx.engine
            .create_slot(
                &fx.admin,
                &NewSlot {
                    starts_at_utc: start,
                    ends_at_utc: start + Duration::minutes(minutes),
                    capacity_total: exp + inexp,
                    capacity_exp: exp,
                    capacity_inexp: inexp,
                },
            )
            .unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn used(fx: &Fixture, lifter: &Actor) -> u32 {
        fx.engine.get_current_quota(lifter).unwrap().used
    }

    fn booking(fx: &Fixture, id: &str) -> Booking {
        let tx = fx.engine.store().read().unwrap();
        tx.get_booking(id).unwrap().unwrap()
    }

    fn assert_conflict(result: Result<String>, expected: &str) {
        match result {
            Err(Error::Conflict(msg)) => assert_eq!(msg, expected),
            other => panic!("expected conflict '{expected}', got {other:?}"),
        }
    }

    #[test]
    fn test_book_slot_records_everything_together() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(12, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);

        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        let stored = booking(&fx, &id);
        assert_eq!(stored.status, BookingStatus::Booked);
        assert_eq!(stored.level, ExperienceLevel::Experienced);
        assert_eq!(used(&fx, &lena), 1);
        assert_eq!(fx.audit_actions(), vec!["slot_created", "booking_created"]);
    }

    #[test]
    fn test_concurrent_last_seat_has_one_winner() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(12, 9, 0), 60, 1, 1);
        let a = fx.add_lifter("A", ExperienceLevel::Inexperienced, 3);
        let b = fx.add_lifter("B", ExperienceLevel::Inexperienced, 3);

        let results: Vec<Result<String>> = thread::scope(|scope| {
            let handles: Vec<_> = [&a, &b]
                .into_iter()
                .map(|lifter| {
                    let engine = &fx.engine;
                    let slot_id = slot.id.as_str();
                    scope.spawn(move || engine.book_slot(lifter, slot_id))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = results.into_iter().find(|r| r.is_err()).unwrap();
        assert_conflict(loser, "No inexperienced slots available");

        let listed = fx.engine.list_slots(at(12, 0, 0), at(13, 0, 0)).unwrap();
        assert_eq!(listed[0].booked_inexp, 1);
    }

    #[test]
    fn test_exhausted_quota_rejects_without_side_effects() {
        let fx = Fixture::new();
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 3);
        for hour in [9, 11, 13] {
            let slot = add_slot(&fx, at(12, hour, 0), 60, 3, 2);
            fx.engine.book_slot(&lena, &slot.id).unwrap();
        }
        assert_eq!(used(&fx, &lena), 3);

        let slot = add_slot(&fx, at(12, 15, 0), 60, 3, 2);
        assert_conflict(fx.engine.book_slot(&lena, &slot.id), "Weekly quota exceeded");

        assert_eq!(used(&fx, &lena), 3);
        assert_eq!(fx.engine.list_my_bookings(&lena).unwrap().len(), 3);
    }

    #[test]
    fn test_late_self_cancel_is_refused() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(11, 12, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        match fx.engine.cancel_booking(&lena, &id) {
            Err(Error::PolicyViolation(msg)) => {
                assert_eq!(msg, "Cannot cancel within 24 hours of slot start");
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
        assert_eq!(booking(&fx, &id).status, BookingStatus::Booked);
        assert_eq!(used(&fx, &lena), 1);
    }

    #[test]
    fn test_admin_cancel_ignores_cutoff_and_refunds() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(11, 12, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        let canceled = fx.engine.cancel_booking(&fx.admin, &id).unwrap();

        assert_eq!(canceled.status, BookingStatus::CanceledByAdmin);
        assert!(canceled.canceled_at.is_some());
        assert_eq!(used(&fx, &lena), 0);
    }

    #[test]
    fn test_book_then_cancel_in_time_restores_quota() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(14, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let before = used(&fx, &lena);

        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();
        let canceled = fx.engine.cancel_booking(&lena, &id).unwrap();

        assert_eq!(canceled.status, BookingStatus::CanceledByLifter);
        assert_eq!(used(&fx, &lena), before);
    }

    #[test]
    fn test_oversized_cutoff_policy_uses_default() {
        let fx = Fixture::new();
        fx.engine
            .upsert_policy(&fx.admin, "cancellationCutoffHours", "3000000000")
            .unwrap();
        let slot = add_slot(&fx, at(14, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        let canceled = fx.engine.cancel_booking(&lena, &id).unwrap();
        assert_eq!(canceled.status, BookingStatus::CanceledByLifter);

        let now = fx.engine.now();
        let year = now.year();
        let month = now.month();
        assert!(fx.engine.monthly_report(&fx.admin, year, month).is_ok());
    }

    #[test]
    fn test_cancel_twice_is_conflict() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(14, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();
        fx.engine.cancel_booking(&lena, &id).unwrap();

        let again = fx.engine.cancel_booking(&lena, &id);
        assert!(matches!(again, Err(Error::Conflict(_))));
        assert_eq!(used(&fx, &lena), 0);
    }

    #[test]
    fn test_cancel_by_another_lifter_is_unauthorized() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(14, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let max = fx.add_lifter("Max", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        assert!(matches!(
            fx.engine.cancel_booking(&max, &id),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            fx.engine.cancel_booking(&Actor::new("ghost"), &id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_overlap_is_half_open() {
        let fx = Fixture::new();
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let first = add_slot(&fx, at(12, 9, 0), 60, 3, 2);
        let overlapping = add_slot(&fx, at(12, 9, 30), 60, 3, 2);
        let touching = add_slot(&fx, at(12, 10, 0), 60, 3, 2);

        fx.engine.book_slot(&lena, &first.id).unwrap();
        assert_conflict(
            fx.engine.book_slot(&lena, &overlapping.id),
            "You have an overlapping booking",
        );
        fx.engine.book_slot(&lena, &touching.id).unwrap();
    }

    #[test]
    fn test_canceled_booking_does_not_block_overlap() {
        let fx = Fixture::new();
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let first = add_slot(&fx, at(14, 9, 0), 60, 3, 2);
        let same_time = add_slot(&fx, at(14, 9, 0), 60, 3, 2);

        let id = fx.engine.book_slot(&lena, &first.id).unwrap();
        fx.engine.cancel_booking(&lena, &id).unwrap();
        fx.engine.book_slot(&lena, &same_time.id).unwrap();
    }

    #[test]
    fn test_levels_never_borrow_capacity() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(12, 9, 0), 60, 0, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);

        assert_conflict(
            fx.engine.book_slot(&lena, &slot.id),
            "No experienced slots available",
        );

        // The window opened during the failed attempt was rolled back.
        let tx = fx.engine.store().read().unwrap();
        let window = tx
            .get_quota_window(&lena.user_id, week_start(fx.engine.now()))
            .unwrap();
        assert!(window.is_none());
    }

    #[test]
    fn test_max_future_bookings() {
        let fx = Fixture::new();
        fx.engine
            .upsert_policy(&fx.admin, "maxFutureBookings", "1")
            .unwrap();
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let first = add_slot(&fx, at(12, 9, 0), 60, 3, 2);
        let second = add_slot(&fx, at(13, 9, 0), 60, 3, 2);

        fx.engine.book_slot(&lena, &first.id).unwrap();
        assert_conflict(
            fx.engine.book_slot(&lena, &second.id),
            "Maximum future bookings exceeded",
        );
    }

    #[test]
    fn test_booking_preconditions() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(12, 9, 0), 60, 3, 2);
        let past = add_slot(&fx, at(10, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let no_level = fx.add_user("Nolevel", Role::Lifter, None, 4);

        assert!(matches!(
            fx.engine.book_slot(&fx.admin, &slot.id),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            fx.engine.book_slot(&no_level, &slot.id),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            fx.engine.book_slot(&lena, "missing"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            fx.engine.book_slot(&lena, &past.id),
            Err(Error::PolicyViolation(_))
        ));

        fx.engine
            .update_slot(
                &fx.admin,
                &slot.id,
                &SlotChanges {
                    status: Some(SlotStatus::Closed),
                    ..SlotChanges::default()
                },
            )
            .unwrap();
        assert_conflict(fx.engine.book_slot(&lena, &slot.id), "Slot not available");

        fx.engine
            .update_user_status(&fx.admin, &lena.user_id, AccountStatus::Frozen)
            .unwrap();
        assert!(matches!(
            fx.engine.book_slot(&lena, &slot.id),
            Err(Error::Authorization(_))
        ));
    }

    #[test]
    fn test_no_show_only_after_slot_ends() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(11, 12, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        fx.clock.set(at(11, 12, 30));
        assert!(matches!(
            fx.engine.mark_no_show(&fx.admin, &id),
            Err(Error::PolicyViolation(_))
        ));
        assert!(matches!(
            fx.engine.mark_no_show(&lena, &id),
            Err(Error::Authorization(_))
        ));

        fx.clock.set(at(11, 13, 0));
        let marked = fx.engine.mark_no_show(&fx.admin, &id).unwrap();
        assert_eq!(marked.status, BookingStatus::NoShow);
        assert_eq!(used(&fx, &lena), 1);

        assert!(matches!(
            fx.engine.cancel_booking(&fx.admin, &id),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_attended_only_after_slot_starts() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(11, 12, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        let id = fx.engine.book_slot(&lena, &slot.id).unwrap();

        assert!(matches!(
            fx.engine.mark_attended(&fx.admin, &id),
            Err(Error::PolicyViolation(_))
        ));

        fx.clock.set(at(11, 12, 5));
        let marked = fx.engine.mark_attended(&fx.admin, &id).unwrap();
        assert_eq!(marked.status, BookingStatus::Attended);
        assert!(matches!(
            fx.engine.mark_no_show(&fx.admin, &id),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_my_bookings_survive_slot_deletion() {
        let fx = Fixture::new();
        let slot = add_slot(&fx, at(12, 9, 0), 60, 3, 2);
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 4);
        fx.engine.book_slot(&lena, &slot.id).unwrap();
        fx.engine.delete_slot(&fx.admin, &slot.id).unwrap();

        let mine = fx.engine.list_my_bookings(&lena).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].booking.status, BookingStatus::CanceledByAdmin);
        assert!(mine[0].slot.is_none());
    }

    #[test]
    fn test_at_most_one_live_booking_per_overlapping_window() {
        let fx = Fixture::new();
        let lena = fx.add_lifter("Lena", ExperienceLevel::Experienced, 10);
        let starts = [at(12, 9, 0), at(12, 9, 15), at(12, 9, 45), at(12, 10, 0), at(12, 10, 30)];
        for start in starts {
            let slot = add_slot(&fx, start, 60, 3, 2);
            let _ = fx.engine.book_slot(&lena, &slot.id);
        }

        let held: Vec<Slot> = fx
            .engine
            .list_my_bookings(&lena)
            .unwrap()
            .into_iter()
            .filter(|b| b.booking.status == BookingStatus::Booked)
            .filter_map(|b| b.slot)
            .collect();
        for (i, a) in held.iter().enumerate() {
            for b in &held[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a.id, b.id);
            }
        }
        assert_eq!(held.len(), 2);
    }
}
