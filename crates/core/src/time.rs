use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{LocolError, Result};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// OTLP timestamps are nanoseconds since the unix epoch.
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    let secs = (nanos / NANOS_PER_SEC) as i64;
    let subnanos = (nanos % NANOS_PER_SEC) as u32;
    Utc.timestamp_opt(secs, subnanos)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn naive_to_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}

/// Accepts RFC3339 or a humantime duration meaning "that long ago".
pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        let ago = chrono::Duration::from_std(duration)
            .map_err(|e| LocolError::Parse(format!("duration out of range {input}: {e}")))?;
        return Ok(Utc::now() - ago);
    }

    Err(LocolError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}
