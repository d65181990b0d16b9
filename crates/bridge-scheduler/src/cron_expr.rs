//! 5-field cron expression parser and next-fire computation.
//!
//! Supports `*`, integer literals, `*/N` step, `a-b` range, and `a,b,c`
//! list, per field. Day-of-week follows the
//! traditional cron convention (`0` and `7` both mean Sunday); when both
//! day-of-month and day-of-week are restricted, a candidate day matches if
//! *either* field matches (classic cron "OR" rule).

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, PartialEq)]
pub struct CronExpr {
    minute: BTreeSet<u32>,
    hour: BTreeSet<u32>,
    dom: BTreeSet<u32>,
    month: BTreeSet<u32>,
    dow: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

/// How far ahead `next_fire` is willing to search before giving up
/// (covers expressions like `0 0 29 2 *` that only fire on leap years).
const SEARCH_LIMIT_MINUTES: i64 = 4 * 366 * 24 * 60;

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::InvalidSchedule(format!(
                "expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            )));
        }
        let minute = parse_field(fields[0], 0, 59)?;
        let hour = parse_field(fields[1], 0, 23)?;
        let dom = parse_field(fields[2], 1, 31)?;
        let month = parse_field(fields[3], 1, 12)?;
        let mut dow = parse_field(fields[4], 0, 7)?;
        // normalize `7` (Sunday alias) into `0`.
        if dow.remove(&7) {
            dow.insert(0);
        }
        Ok(Self {
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
            minute,
            hour,
            dom,
            month,
            dow,
        })
    }

    fn day_matches(&self, dt: DateTime<Utc>) -> bool {
        let dom_ok = self.dom.contains(&dt.day());
        let dow_ok = self.dow.contains(&(dt.weekday().num_days_from_sunday()));
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom_ok || dow_ok,
            (true, false) => dom_ok,
            (false, true) => dow_ok,
            (false, false) => true,
        }
    }

    fn matches(&self, dt: DateTime<Utc>) -> bool {
        self.minute.contains(&dt.minute())
            && self.hour.contains(&dt.hour())
            && self.month.contains(&dt.month())
            && self.day_matches(dt)
    }

    /// First instant strictly after `from` that matches this expression.
    /// `None` if nothing matches within [`SEARCH_LIMIT_MINUTES`].
    pub fn next_fire_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = Utc
            .with_ymd_and_hms(from.year(), from.month(), from.day(), from.hour(), from.minute(), 0)
            .single()?
            + Duration::minutes(1);

        for _ in 0..SEARCH_LIMIT_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<BTreeSet<u32>> {
    let mut out = BTreeSet::new();
    for part in field.split(',') {
        out.extend(parse_part(part, min, max)?);
    }
    Ok(out)
}

fn parse_part(part: &str, min: u32, max: u32) -> Result<BTreeSet<u32>> {
    let (range_part, step) = match part.split_once('/') {
        Some((base, step_str)) => {
            let step: u32 = step_str
                .parse()
                .map_err(|_| SchedulerError::InvalidSchedule(format!("bad step in `{part}`")))?;
            if step == 0 {
                return Err(SchedulerError::InvalidSchedule(format!("step cannot be 0 in `{part}`")));
            }
            (base, step)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range_part == "*" {
        (min, max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        let lo: u32 = a
            .parse()
            .map_err(|_| SchedulerError::InvalidSchedule(format!("bad range in `{part}`")))?;
        let hi: u32 = b
            .parse()
            .map_err(|_| SchedulerError::InvalidSchedule(format!("bad range in `{part}`")))?;
        (lo, hi)
    } else {
        let v: u32 = range_part
            .parse()
            .map_err(|_| SchedulerError::InvalidSchedule(format!("bad value in `{part}`")))?;
        (v, v)
    };

    if lo < min || hi > max || lo > hi {
        return Err(SchedulerError::InvalidSchedule(format!(
            "`{part}` out of range [{min}, {max}]"
        )));
    }

    Ok((lo..=hi).step_by(step as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_every_minute() {
        let e = CronExpr::parse("* * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        assert_eq!(e.next_fire_after(from), Some(from + Duration::minutes(1)));
    }

    #[test]
    fn step_field_every_fifteen_minutes() {
        let e = CronExpr::parse("*/15 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 7, 28, 10, 1, 0).unwrap();
        let next = e.next_fire_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 28, 10, 15, 0).unwrap());
    }

    #[test]
    fn list_and_range_hours() {
        let e = CronExpr::parse("0 9,17 * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        let next = e.next_fire_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 28, 17, 0, 0).unwrap());
    }

    #[test]
    fn dom_or_dow_matches_either() {
        // fires on the 1st of the month OR every Monday.
        let e = CronExpr::parse("0 0 1 * 1").unwrap();
        assert!(e.dom_restricted && e.dow_restricted);
        let monday = Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(); // a Monday
        assert!(e.matches(monday));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("* * * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(CronExpr::parse("60 * * * *").is_err());
    }
}
