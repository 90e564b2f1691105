//! Day autofill planning from the `defaultWorkingHours` policy.
//!
//! Everything here is pure: the slot manager loads the policy and the gym
//! zone, asks [`plan_day_slots`] for the hour blocks and inserts them.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest DST gap searched for a valid wall-clock time.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// One `HH:mm - HH:mm` range of local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A one-hour block to be inserted as a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSlot {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let (hours, minutes) = raw.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.chars().chain(minutes.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}

/// Parses comma-separated `HH:mm - HH:mm` ranges. Whitespace is ignored and
/// malformed ranges are skipped with a warning.
#[must_use]
pub fn parse_working_hours(raw: &str) -> Vec<WorkingRange> {
    let mut ranges = Vec::new();

    for part in raw.split(',') {
        let compact: String = part.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            continue;
        }

        let parsed = compact.split_once('-').and_then(|(lhs, rhs)| {
            Some(WorkingRange {
                start: parse_hhmm(lhs)?,
                end: parse_hhmm(rhs)?,
            })
        });

        match parsed {
            Some(range) => ranges.push(range),
            None => tracing::warn!(range = %part.trim(), "Skipping malformed working-hours range"),
        }
    }

    ranges
}

/// Converts a local wall-clock time in `zone` to an instant.
///
/// A time repeated by a DST fold resolves to the earlier instant. A time
/// skipped by a DST gap resolves to the instant the gap ends.
#[must_use]
pub fn local_wall_clock_to_instant(date: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let local = date.and_time(time);

    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            for minutes in 1..=MAX_GAP_MINUTES {
                if let Some(dt) = zone
                    .from_local_datetime(&(local + Duration::minutes(minutes)))
                    .earliest()
                {
                    return dt.with_timezone(&Utc);
                }
            }
            tracing::warn!(%local, %zone, "No valid wall-clock time found, reading as UTC");
            local.and_utc()
        }
    }
}

/// Plans the one-hour slots for the local calendar day containing
/// `day_start_utc` in `zone`.
///
/// A range whose end is not after its start is clipped to the end of the
/// local day. Only whole hours are produced; a trailing partial hour is
/// dropped. Blocks are deduplicated by start, first range wins, and the
/// result is ordered by start.
#[must_use]
pub fn plan_day_slots(day_start_utc: DateTime<Utc>, ranges: &[WorkingRange], zone: Tz) -> Vec<PlannedSlot> {
    let local_date = day_start_utc.with_timezone(&zone).date_naive();
    let end_of_day = local_date
        .checked_add_days(Days::new(1))
        .map(|next| local_wall_clock_to_instant(next, NaiveTime::MIN, zone));

    let mut planned: BTreeMap<DateTime<Utc>, PlannedSlot> = BTreeMap::new();
    let hour = Duration::hours(1);

    for range in ranges {
        let mut start = local_wall_clock_to_instant(local_date, range.start, zone);
        let mut end = local_wall_clock_to_instant(local_date, range.end, zone);

        if end <= start {
            match end_of_day {
                Some(eod) => end = eod,
                None => continue,
            }
        }

        while start + hour <= end {
            planned.entry(start).or_insert(PlannedSlot {
                starts_at: start,
                ends_at: start + hour,
            });
            start += hour;
        }
    }

    planned.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn starts(planned: &[PlannedSlot]) -> Vec<DateTime<Utc>> {
        planned.iter().map(|p| p.starts_at).collect()
    }

    #[test]
    fn test_parse_default_working_hours() {
        let ranges = parse_working_hours("09:00 - 14:00, 17:00-22:00");
        assert_eq!(
            ranges,
            vec![
                WorkingRange {
                    start: time(9, 0),
                    end: time(14, 0)
                },
                WorkingRange {
                    start: time(17, 0),
                    end: time(22, 0)
                },
            ]
        );
    }

    #[test]
    fn test_parse_skips_malformed_ranges() {
        let ranges = parse_working_hours("9-11, 25:00-26:00, 07:5-08:00,, 8:00 - 09:00, 10:00");
        assert_eq!(
            ranges,
            vec![WorkingRange {
                start: time(8, 0),
                end: time(9, 0)
            }]
        );
    }

    #[test]
    fn test_two_hour_range_at_plus_two() {
        let ranges = parse_working_hours("09:00-11:00");
        let day = utc(2026, 3, 10, 22, 0);

        let planned = plan_day_slots(day, &ranges, chrono_tz::Etc::GMTMinus2);

        assert_eq!(starts(&planned), vec![utc(2026, 3, 11, 7, 0), utc(2026, 3, 11, 8, 0)]);
        assert!(planned.iter().all(|p| p.ends_at - p.starts_at == Duration::hours(1)));
    }

    #[test]
    fn test_default_hours_in_istanbul() {
        let ranges = parse_working_hours("09:00 - 14:00, 17:00-22:00");
        let day = utc(2026, 3, 10, 21, 0);

        let planned = plan_day_slots(day, &ranges, chrono_tz::Europe::Istanbul);

        assert_eq!(planned.len(), 10);
        assert_eq!(planned[0].starts_at, utc(2026, 3, 11, 6, 0));
        assert_eq!(planned[9].starts_at, utc(2026, 3, 11, 18, 0));
    }

    #[test]
    fn test_overnight_range_is_clipped_to_local_midnight() {
        let ranges = parse_working_hours("20:00 - 02:00");
        let day = utc(2026, 3, 11, 0, 0);

        let planned = plan_day_slots(day, &ranges, chrono_tz::UTC);

        assert_eq!(planned.len(), 4);
        assert_eq!(planned[3].ends_at, utc(2026, 3, 12, 0, 0));
    }

    #[test]
    fn test_overlapping_ranges_dedup_by_start() {
        let ranges = parse_working_hours("09:00-11:00, 10:00-12:00");
        let day = utc(2026, 3, 11, 0, 0);

        let planned = plan_day_slots(day, &ranges, chrono_tz::UTC);

        assert_eq!(
            starts(&planned),
            vec![utc(2026, 3, 11, 9, 0), utc(2026, 3, 11, 10, 0), utc(2026, 3, 11, 11, 0)]
        );
    }

    #[test]
    fn test_partial_trailing_hour_is_dropped() {
        let ranges = parse_working_hours("09:00-10:30");
        let planned = plan_day_slots(utc(2026, 3, 11, 0, 0), &ranges, chrono_tz::UTC);
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn test_spring_forward_day_is_exact() {
        // Berlin skips 02:00-03:00 local on 2026-03-29.
        let ranges = parse_working_hours("01:00-04:00");
        let day = utc(2026, 3, 28, 23, 0);

        let planned = plan_day_slots(day, &ranges, chrono_tz::Europe::Berlin);

        assert_eq!(starts(&planned), vec![utc(2026, 3, 29, 0, 0), utc(2026, 3, 29, 1, 0)]);
    }

    #[test]
    fn test_gap_time_resolves_to_gap_end() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        let instant = local_wall_clock_to_instant(date, time(2, 30), chrono_tz::Europe::Berlin);
        assert_eq!(instant, utc(2026, 3, 29, 1, 0));
    }

    #[test]
    fn test_fold_time_resolves_to_earlier_instant() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let instant = local_wall_clock_to_instant(date, time(2, 30), chrono_tz::Europe::Berlin);
        assert_eq!(instant, utc(2026, 10, 25, 0, 30));
    }
}
