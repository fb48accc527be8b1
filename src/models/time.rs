// Timestamp helpers: scheduler wire formats, snapshot keys, serde adapters

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Snapshot keys are UTC instants at whole-second precision, e.g. `2024-03-01T06:00:00`.
pub const SNAPSHOT_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Anything at or before the epoch is treated as unset.
const UNSET_CUTOFF_SECS: i64 = 0;

/// Submit times written by older pollers.
const LEGACY_SUBMIT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn snapshot_key(ts: &DateTime<Utc>) -> String {
    ts.format(SNAPSHOT_KEY_FORMAT).to_string()
}

pub fn parse_snapshot_key(key: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(key, SNAPSHOT_KEY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Truncates to whole seconds so that the instant round-trips through its snapshot key.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Last whole second of the day (23:59:59), the inclusive upper bound of a report window.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + chrono::Duration::days(1) - chrono::Duration::seconds(1)
}

/// Scheduler timestamps are nanoseconds since the epoch.
pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Parses an RFC 3339 scheduler timestamp. The scheduler reports unset times as the zero
/// instant (`0001-01-01T00:00:00Z`); those map to `None`, as do empty strings.
pub fn parse_scheduler_time(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    let ts = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
    if ts.timestamp() <= UNSET_CUTOFF_SECS {
        return None;
    }
    Some(ts)
}

/// `Option<DateTime<Utc>>` as RFC 3339 (nanosecond precision); reads the scheduler's zero
/// instant as `None`.
pub mod opt_scheduler_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(ts) => s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => {
                if DateTime::parse_from_rfc3339(&s).is_err() {
                    return Err(serde::de::Error::custom(format!("invalid timestamp: {s}")));
                }
                Ok(super::parse_scheduler_time(&s))
            }
        }
    }
}

/// Submit time: written as RFC 3339, read as RFC 3339 or the legacy `%Y-%m-%d %H:%M:%S`.
pub mod submit_time {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&s) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&s, super::LEGACY_SUBMIT_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| serde::de::Error::custom(format!("invalid submit time: {s}")))
    }
}
