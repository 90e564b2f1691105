//! Soft configuration stored in the `policies` table.
//!
//! Values are untyped strings. Every consumer resolves a key through
//! [`resolve`] and parses it itself; a missing key or an unparsable value
//! falls back to the key's default so that policy never fails a booking path.

use std::collections::HashMap;

use chrono_tz::Tz;

use crate::types::{ExperienceLevel, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKey {
    CancellationCutoffHours,
    DefaultWeeklyQuotaExperienced,
    DefaultWeeklyQuotaInexperienced,
    MaxFutureBookings,
    /// Seeded for the waitlist, which has no logic behind it.
    WaitlistOfferTimeoutMinutes,
    GymTimezone,
    DefaultWorkingHours,
}

impl PolicyKey {
    pub const ALL: &'static [PolicyKey] = &[
        PolicyKey::CancellationCutoffHours,
        PolicyKey::DefaultWeeklyQuotaExperienced,
        PolicyKey::DefaultWeeklyQuotaInexperienced,
        PolicyKey::MaxFutureBookings,
        PolicyKey::WaitlistOfferTimeoutMinutes,
        PolicyKey::GymTimezone,
        PolicyKey::DefaultWorkingHours,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PolicyKey::CancellationCutoffHours => "cancellationCutoffHours",
            PolicyKey::DefaultWeeklyQuotaExperienced => "defaultWeeklyQuotaExperienced",
            PolicyKey::DefaultWeeklyQuotaInexperienced => "defaultWeeklyQuotaInexperienced",
            PolicyKey::MaxFutureBookings => "maxFutureBookings",
            PolicyKey::WaitlistOfferTimeoutMinutes => "waitlistOfferTimeoutMinutes",
            PolicyKey::GymTimezone => "gymTimezone",
            PolicyKey::DefaultWorkingHours => "defaultWorkingHours",
        }
    }

    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            PolicyKey::CancellationCutoffHours => "24",
            PolicyKey::DefaultWeeklyQuotaExperienced => "4",
            PolicyKey::DefaultWeeklyQuotaInexperienced => "3",
            PolicyKey::MaxFutureBookings => "10",
            PolicyKey::WaitlistOfferTimeoutMinutes => "15",
            PolicyKey::GymTimezone => "Europe/Istanbul",
            PolicyKey::DefaultWorkingHours => "09:00 - 14:00, 17:00-22:00",
        }
    }

    pub fn parse(s: &str) -> Option<PolicyKey> {
        PolicyKey::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    #[must_use]
    pub const fn weekly_quota_for(level: ExperienceLevel) -> PolicyKey {
        match level {
            ExperienceLevel::Experienced => PolicyKey::DefaultWeeklyQuotaExperienced,
            ExperienceLevel::Inexperienced => PolicyKey::DefaultWeeklyQuotaInexperienced,
        }
    }
}

/// Returns the stored value for `key`, or its default when absent.
#[must_use]
pub fn resolve<'a>(key: PolicyKey, overrides: &'a HashMap<String, String>) -> &'a str {
    overrides
        .get(key.as_str())
        .map(String::as_str)
        .unwrap_or(key.default_value())
}

/// Integer-valued policy with the default applied on absence or parse failure.
#[must_use]
pub fn resolve_i64(key: PolicyKey, overrides: &HashMap<String, String>) -> i64 {
    let raw = resolve(key, overrides);
    match raw.trim().parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                "Policy {} has non-integer value '{}', using default {}",
                key.as_str(),
                raw,
                key.default_value()
            );
            key.default_value().parse().unwrap_or_default()
        }
    }
}

/// Non-negative integer policy; negative values clamp to zero.
#[must_use]
pub fn resolve_u32(key: PolicyKey, overrides: &HashMap<String, String>) -> u32 {
    u32::try_from(resolve_i64(key, overrides).max(0)).unwrap_or(u32::MAX)
}

/// IANA timezone policy; an unknown zone name falls back to the default zone.
#[must_use]
pub fn resolve_timezone(overrides: &HashMap<String, String>) -> Tz {
    let raw = resolve(PolicyKey::GymTimezone, overrides);
    raw.trim().parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!("Policy gymTimezone has unknown zone '{raw}', using default");
        PolicyKey::GymTimezone
            .default_value()
            .parse::<Tz>()
            .unwrap_or(Tz::UTC)
    })
}

const MAX_CUTOFF_HOURS: i64 = 24 * 366;

/// Policies loaded once per operation.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    values: HashMap<String, String>,
}

impl PolicySet {
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn from_policies(policies: Vec<Policy>) -> Self {
        Self::new(policies.into_iter().map(|p| (p.key, p.value)).collect())
    }

    #[must_use]
    pub fn raw(&self, key: PolicyKey) -> &str {
        resolve(key, &self.values)
    }

    /// Hours before slot start after which owners can no longer cancel.
    /// Values outside zero to one year fall back to the default.
    #[must_use]
    pub fn cancellation_cutoff_hours(&self) -> i64 {
        let hours = resolve_i64(PolicyKey::CancellationCutoffHours, &self.values);
        if (0..=MAX_CUTOFF_HOURS).contains(&hours) {
            return hours;
        }
        tracing::warn!(
            "Policy cancellationCutoffHours value {hours} is out of range, using default '{}'",
            PolicyKey::CancellationCutoffHours.default_value()
        );
        PolicyKey::CancellationCutoffHours
            .default_value()
            .parse()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn max_future_bookings(&self) -> u32 {
        resolve_u32(PolicyKey::MaxFutureBookings, &self.values)
    }

    #[must_use]
    pub fn default_weekly_quota(&self, level: ExperienceLevel) -> u32 {
        resolve_u32(PolicyKey::weekly_quota_for(level), &self.values)
    }

    #[must_use]
    pub fn gym_timezone(&self) -> Tz {
        resolve_timezone(&self.values)
    }

    #[must_use]
    pub fn default_working_hours(&self) -> &str {
        self.raw(PolicyKey::DefaultWorkingHours)
    }
}
