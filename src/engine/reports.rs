use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::quota::{effective_usage, week_start};
use super::{Actor, Engine, load_policies, require_admin};
use crate::error::{Error, Result};
use crate::store::Tx;
use crate::types::{AccountStatus, Booking, BookingStatus, Role, Slot, SlotStatus};

/// Whole-number percentage of `part` over `whole`, rounded half up. Zero when
/// `whole` is zero.
fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    u32::try_from((part * 100 + whole / 2) / whole).unwrap_or(u32::MAX)
}

fn count(n: usize) -> u64 {
    n as u64
}

/// `[first day of month, first day of next month)` in UTC.
fn month_bounds(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if !(1..=12).contains(&month) {
        return Err(Error::validation("Month must be between 1 and 12"));
    }
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

    let start = NaiveDate::from_ymd_opt(year, month, 1);
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1);
    match (start, end) {
        (Some(start), Some(end)) => Ok((
            start.and_time(NaiveTime::MIN).and_utc(),
            end.and_time(NaiveTime::MIN).and_utc(),
        )),
        _ => Err(Error::validation("Year out of range")),
    }
}

/// Booked or attended bookings on the slot.
fn held_bookings(tx: &dyn Tx, slot_id: &str) -> Result<Vec<Booking>> {
    let mut held = tx.list_slot_bookings(slot_id, BookingStatus::Booked)?;
    held.extend(tx.list_slot_bookings(slot_id, BookingStatus::Attended)?);
    Ok(held)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_lifters: u32,
    /// Open slots starting within the next seven days.
    pub active_slots: u32,
    /// Live bookings created this week.
    pub total_bookings: u32,
    pub compliance_rate: u32,
    pub utilization_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    /// `YYYY-MM`.
    pub period: String,
    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub canceled_by_lifter: u32,
    pub canceled_by_admin: u32,
    pub late_cancellations: u32,
    pub no_shows: u32,
    pub utilization_rate: u32,
    pub fill_rate_at_cutoff: u32,
    pub unique_lifters: u32,
    pub quota_compliance_rate: u32,
    pub total_slots: u32,
    pub total_capacity: u32,
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl Engine {
    pub fn dashboard_stats(&self, actor: &Actor) -> Result<DashboardStats> {
        let now = self.now();
        let this_week = week_start(now);

        self.read(|tx| {
            require_admin(tx, actor)?;

            let lifters = tx.list_profiles_by_role(Role::Lifter)?;
            let active: Vec<_> = lifters
                .iter()
                .filter(|p| p.status == AccountStatus::Active)
                .collect();
            let mut compliant = 0;
            for profile in &active {
                let (quota, used) = effective_usage(tx, profile, this_week)?;
                if used >= quota {
                    compliant += 1;
                }
            }

            let upcoming: Vec<Slot> = tx
                .list_slots_starting_between(now, now + Duration::days(7))?
                .into_iter()
                .filter(|s| s.status == SlotStatus::Open)
                .collect();
            let capacity: u64 = upcoming.iter().map(|s| u64::from(s.capacity_total)).sum();
            let mut booked = 0;
            for slot in &upcoming {
                booked += tx.list_slot_bookings(&slot.id, BookingStatus::Booked)?.len();
            }

            let weekly_bookings = tx
                .list_bookings_created_between(this_week, this_week + Duration::days(7))?
                .into_iter()
                .filter(|b| b.status == BookingStatus::Booked)
                .count();

            Ok(DashboardStats {
                total_lifters: to_u32(lifters.len()),
                active_slots: to_u32(upcoming.len()),
                total_bookings: to_u32(weekly_bookings),
                compliance_rate: percent(compliant, count(active.len())),
                utilization_rate: percent(count(booked), capacity),
            })
        })
    }

    /// Statistics for one UTC calendar month. Bookings are attributed to the
    /// month they were created in, slots to the month they start in.
    pub fn monthly_report(&self, actor: &Actor, year: i32, month: u32) -> Result<MonthlyReport> {
        let (from, to) = month_bounds(year, month)?;
        let now = self.now();

        self.read(|tx| {
            require_admin(tx, actor)?;
            let cutoff = Duration::hours(load_policies(tx)?.cancellation_cutoff_hours());

            let bookings = tx.list_bookings_created_between(from, to)?;
            let slots = tx.list_slots_starting_between(from, to)?;
            let with_status =
                |status: BookingStatus| bookings.iter().filter(|b| b.status == status).count();

            let mut late_cancellations = 0;
            for booking in bookings.iter().filter(|b| b.status == BookingStatus::CanceledByLifter) {
                let slot = tx.get_slot(&booking.slot_id)?;
                let (Some(canceled_at), Some(slot)) = (booking.canceled_at, slot) else {
                    continue;
                };
                if canceled_at > slot.starts_at_utc - cutoff {
                    late_cancellations += 1;
                }
            }

            let total_capacity: u64 = slots.iter().map(|s| u64::from(s.capacity_total)).sum();
            let held = with_status(BookingStatus::Booked) + with_status(BookingStatus::Attended);

            let mut past_cutoff = 0;
            let mut filled_at_cutoff = 0;
            for slot in &slots {
                let slot_cutoff = slot.starts_at_utc - cutoff;
                if slot_cutoff > now {
                    continue;
                }
                past_cutoff += 1;
                let early = held_bookings(tx, &slot.id)?
                    .into_iter()
                    .filter(|b| b.created_at <= slot_cutoff)
                    .count();
                if early >= slot.capacity_total as usize {
                    filled_at_cutoff += 1;
                }
            }

            let unique_lifters: HashSet<&str> = bookings.iter().map(|b| b.lifter_id.as_str()).collect();

            let mut weeks = Vec::new();
            let mut week = week_start(from);
            while week < to {
                weeks.push(week);
                week += Duration::days(7);
            }

            let active: Vec<_> = tx
                .list_profiles_by_role(Role::Lifter)?
                .into_iter()
                .filter(|p| p.status == AccountStatus::Active)
                .collect();
            let mut compliant = 0;
            for profile in &active {
                let mut met_every_week = true;
                for &week in &weeks {
                    let (quota, used) = effective_usage(tx, profile, week)?;
                    if used < quota {
                        met_every_week = false;
                        break;
                    }
                }
                if met_every_week {
                    compliant += 1;
                }
            }

            Ok(MonthlyReport {
                period: format!("{year}-{month:02}"),
                total_bookings: to_u32(bookings.len()),
                completed_bookings: to_u32(with_status(BookingStatus::Attended)),
                canceled_by_lifter: to_u32(with_status(BookingStatus::CanceledByLifter)),
                canceled_by_admin: to_u32(with_status(BookingStatus::CanceledByAdmin)),
                late_cancellations,
                no_shows: to_u32(with_status(BookingStatus::NoShow)),
                utilization_rate: percent(count(held), total_capacity),
                fill_rate_at_cutoff: percent(filled_at_cutoff, past_cutoff),
                unique_lifters: to_u32(unique_lifters.len()),
                quota_compliance_rate: percent(compliant, count(active.len())),
                total_slots: to_u32(slots.len()),
                total_capacity: u32::try_from(total_capacity).unwrap_or(u32::MAX),
            })
        })
    }
}
