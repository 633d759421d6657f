// src/schedule/cron.rs

//! Recurrence computation for five-field cron expressions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::errors::{CronrunError, Result};

/// Convert a standard 5-field Unix cron expression to the 7-field format
/// expected by the `cron` crate.
///
/// 5-field format: minute hour day-of-month month day-of-week
/// 7-field format: second minute hour day-of-month month day-of-week year
///
/// We add "0" for seconds (fire at :00 of each minute) and "*" for year.
fn to_cron_crate_format(expression: &str) -> String {
    let field_count = expression.split_whitespace().count();
    if field_count >= 6 {
        // Already in extended format, use as-is.
        expression.to_string()
    } else if field_count == 5 {
        format!("0 {expression} *")
    } else {
        // Invalid format; let the parser produce the error.
        expression.to_string()
    }
}

fn parse(expression: &str) -> Result<Schedule> {
    Schedule::from_str(&to_cron_crate_format(expression))
        .map_err(|err| CronrunError::InvalidCron(format!("{expression}: {err}")))
}

/// Check that an expression parses, without computing a fire time.
pub fn validate(expression: &str) -> Result<()> {
    parse(expression).map(|_| ())
}

/// The next fire time strictly after `after`, in UTC.
pub fn next_fire_after(expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = parse(expression)?;
    schedule.after(&after).next().ok_or_else(|| {
        CronrunError::InvalidCron(format!("no upcoming fire time for '{expression}'"))
    })
}

/// [`next_fire_after`] over ms-since-epoch timestamps, the form the
/// scheduler stores.
pub fn next_fire_ms(expression: &str, after_ms: i64) -> Result<i64> {
    let after = DateTime::<Utc>::from_timestamp_millis(after_ms).ok_or_else(|| {
        CronrunError::InvalidCron(format!("timestamp {after_ms} out of range"))
    })?;
    Ok(next_fire_after(expression, after)?.timestamp_millis())
}
