use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::profiles::summarize;
use super::{Actor, Engine, UserSummary, require_admin, require_lifter};
use crate::error::Result;
use crate::store::Tx;
use crate::types::{AccountStatus, QuotaWindow, Role, UserProfile};

/// Monday 00:00 UTC of the ISO week containing `instant`.
#[must_use]
pub fn week_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let date = instant.date_naive();
    let back = u64::from(date.weekday().num_days_from_monday());
    let monday = date.checked_sub_days(Days::new(back)).unwrap_or(date);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// Last millisecond of the week starting at `week_start`.
#[must_use]
pub fn week_end(week_start: DateTime<Utc>) -> DateTime<Utc> {
    week_start + Duration::days(7) - Duration::milliseconds(1)
}

/// Returns the lifter's window for the week, creating it with a snapshot of
/// the profile's weekly quota if absent.
pub(crate) fn get_or_create_window(
    tx: &dyn Tx,
    profile: &UserProfile,
    week_start: DateTime<Utc>,
) -> Result<QuotaWindow> {
    if let Some(window) = tx.get_quota_window(&profile.user_id, week_start)? {
        return Ok(window);
    }

    let window = QuotaWindow {
        id: Uuid::new_v4().to_string(),
        lifter_id: profile.user_id.clone(),
        week_start_utc: week_start,
        week_end_utc: week_end(week_start),
        quota: profile.weekly_quota,
        used: 0,
    };
    tx.create_quota_window(&window)?;
    tracing::debug!(lifter_id = %window.lifter_id, week_start = %week_start, "Opened quota window");
    Ok(window)
}

/// Gives back one unit on the lifter's window for the week, if that window
/// exists and has anything used. Returns whether a unit was refunded.
pub(crate) fn refund(tx: &dyn Tx, lifter_id: &str, week_start: DateTime<Utc>) -> Result<bool> {
    match tx.get_quota_window(lifter_id, week_start)? {
        Some(window) => tx.decrement_quota_used(&window.id),
        None => Ok(false),
    }
}

/// Quota and usage for a week, persisted or synthesized from the profile.
pub(crate) fn effective_usage(
    tx: &dyn Tx,
    profile: &UserProfile,
    week_start: DateTime<Utc>,
) -> Result<(u32, u32)> {
    Ok(match tx.get_quota_window(&profile.user_id, week_start)? {
        Some(window) => (window.quota, window.used),
        None => (profile.weekly_quota, 0),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSummary {
    pub quota: u32,
    pub used: u32,
    pub remaining: u32,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnbookedLifter {
    #[serde(flatten)]
    pub lifter: UserSummary,
    pub quota_total: u32,
    pub quota_used: u32,
    pub quota_remaining: u32,
}

impl Engine {
    /// The lifter's quota for the current week. Never writes.
    pub fn get_current_quota(&self, actor: &Actor) -> Result<QuotaSummary> {
        let start = week_start(self.now());

        self.read(|tx| {
            let profile = require_lifter(tx, actor)?;

            Ok(match tx.get_quota_window(&profile.user_id, start)? {
                Some(window) => QuotaSummary {
                    quota: window.quota,
                    used: window.used,
                    remaining: window.remaining(),
                    week_start: window.week_start_utc,
                    week_end: window.week_end_utc,
                },
                None => QuotaSummary {
                    quota: profile.weekly_quota,
                    used: 0,
                    remaining: profile.weekly_quota,
                    week_start: start,
                    week_end: week_end(start),
                },
            })
        })
    }

    /// Materializes the current week's window ahead of the first booking.
    /// Returns the window id; calling it again returns the same id.
    pub fn create_quota_window(&self, actor: &Actor) -> Result<String> {
        let start = week_start(self.now());

        self.write(|tx| {
            let profile = require_lifter(tx, actor)?;
            Ok(get_or_create_window(tx, &profile, start)?.id)
        })
    }

    /// Active lifters who have not used their full quota this week.
    pub fn unbooked_lifters(&self, actor: &Actor) -> Result<Vec<UnbookedLifter>> {
        let start = week_start(self.now());

        self.read(|tx| {
            require_admin(tx, actor)?;

            let mut lifters = Vec::new();
            for profile in tx.list_profiles_by_role(Role::Lifter)? {
                if profile.status != AccountStatus::Active {
                    continue;
                }

                let (quota, used) = effective_usage(tx, &profile, start)?;
                if used >= quota {
                    continue;
                }

                let user = tx.get_user(&profile.user_id)?;
                lifters.push(UnbookedLifter {
                    lifter: summarize(user, profile),
                    quota_total: quota,
                    quota_used: used,
                    quota_remaining: quota - used,
                });
            }
            Ok(lifters)
        })
    }
}
