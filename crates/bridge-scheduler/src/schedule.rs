//! `at|every|cron` expression surface and next-fire computation
//! over the parsed [`Schedule`].
//!
//! A match over the three schedule kinds, backed by
//! [`crate::cron_expr::CronExpr`] for the `cron` kind.

use chrono::{DateTime, Utc};

use crate::cron_expr::CronExpr;
use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Parse `"at <ISO-8601>"`, `"every <N>{s|m|h}"`, or `"cron \"<5-field>\""`
///.
pub fn parse_schedule_arg(s: &str) -> Result<Schedule> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("at ") {
        let dt: DateTime<Utc> = rest
            .trim()
            .parse()
            .map_err(|_| SchedulerError::InvalidSchedule(format!("bad ISO-8601 instant: `{rest}`")))?;
        return Ok(Schedule::At { at: dt.timestamp_millis() });
    }
    if let Some(rest) = s.strip_prefix("every ") {
        let rest = rest.trim();
        let (num_str, unit) = rest.split_at(rest.len() - 1);
        let n: i64 = num_str
            .parse()
            .map_err(|_| SchedulerError::InvalidSchedule(format!("bad duration: `{rest}`")))?;
        let ms = match unit {
            "s" => n * 1_000,
            "m" => n * 60_000,
            "h" => n * 3_600_000,
            other => {
                return Err(SchedulerError::InvalidSchedule(format!(
                    "unknown duration unit `{other}` (expected s, m, or h)"
                )))
            }
        };
        return Ok(Schedule::Every { every: ms });
    }
    if let Some(rest) = s.strip_prefix("cron ") {
        let expr = rest.trim().trim_matches('"').to_string();
        CronExpr::parse(&expr)?; // validate eagerly so `/cron add` fails fast
        return Ok(Schedule::Cron { cron: expr, tz: None });
    }
    Err(SchedulerError::InvalidSchedule(format!(
        "unrecognized schedule `{s}` (expected `at`, `every`, or `cron`)"
    )))
}

/// Inverse of [`parse_schedule_arg`] for the canonical forms.
pub fn format_schedule(schedule: &Schedule) -> String {
    match schedule {
        Schedule::At { at } => {
            let dt = DateTime::<Utc>::from_timestamp_millis(*at).unwrap_or_else(Utc::now);
            format!("at {}", dt.to_rfc3339())
        }
        Schedule::Every { every } => {
            if every % 3_600_000 == 0 {
                format!("every {}h", every / 3_600_000)
            } else if every % 60_000 == 0 {
                format!("every {}m", every / 60_000)
            } else {
                format!("every {}s", every / 1_000)
            }
        }
        Schedule::Cron { cron, .. } => format!("cron \"{cron}\""),
    }
}

/// Compute the next UTC fire instant after `from`. `None` means the
/// schedule is exhausted (a past `at` instant).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::At { at } => {
            let at = DateTime::<Utc>::from_timestamp_millis(*at)?;
            if at > from {
                Some(at)
            } else {
                None
            }
        }
        Schedule::Every { every } => Some(from + chrono::Duration::milliseconds(*every)),
        Schedule::Cron { cron, .. } => CronExpr::parse(cron).ok()?.next_fire_after(from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_format_every_is_idempotent() {
        let s = parse_schedule_arg("every 5m").unwrap();
        assert_eq!(format_schedule(&s), "every 5m");
    }

    #[test]
    fn parse_then_format_cron_is_idempotent() {
        let s = parse_schedule_arg("cron \"*/5 * * * *\"").unwrap();
        assert_eq!(format_schedule(&s), "cron \"*/5 * * * *\"");
    }

    #[test]
    fn every_computes_fixed_interval() {
        let s = Schedule::Every { every: 60_000 };
        let from = Utc::now();
        let next = compute_next_run(&s, from).unwrap();
        assert_eq!((next - from).num_milliseconds(), 60_000);
    }

    #[test]
    fn past_at_instant_is_exhausted() {
        let s = Schedule::At { at: 0 };
        assert!(compute_next_run(&s, Utc::now()).is_none());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_schedule_arg("whenever").is_err());
    }
}
