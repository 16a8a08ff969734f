//! Lenient parsing of client-supplied times.
//!
//! Counter terminals report their own clock when a payment is confirmed so
//! that `paid_at` reflects the moment at the till rather than the moment the
//! request reached the server. Terminal clocks are not trusted to be
//! well-formed: every parser here returns `Option` and the caller decides the
//! fallback.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Offset-carrying layouts tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Naive layouts, read as wall time in the server zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a date/time string.
///
/// Accepts RFC 3339 and a handful of common layouts, a bare date (midnight),
/// and `@<unix seconds>`. Values without an offset are wall time in
/// `server_tz`; a wall time that does not exist there (DST gap) fails.
pub fn parse_client_time(raw: &str, server_tz: Tz) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(secs) = raw.strip_prefix('@') {
        let secs: i64 = secs.parse().ok()?;
        let instant = DateTime::from_timestamp(secs, 0)?;
        return Some(instant.with_timezone(&server_tz).fixed_offset());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    server_tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parse an IANA zone name such as `Asia/Jakarta`.
pub fn parse_timezone(raw: &str) -> Option<Tz> {
    raw.trim().parse().ok()
}

/// Current server time in the configured zone.
pub fn server_now(server_tz: Tz, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&server_tz).fixed_offset()
}

/// Pick the timestamp recorded by a status change.
///
/// A parseable `client_time` wins over `now`. A parseable `client_tz` then
/// re-expresses that instant in the client's zone; an unparseable zone is
/// ignored and the instant keeps the zone it was parsed in.
pub fn effective_timestamp(
    client_time: Option<&str>,
    client_tz: Option<&str>,
    server_tz: Tz,
    now: DateTime<Utc>,
) -> DateTime<FixedOffset> {
    let Some(parsed) = client_time.and_then(|raw| parse_client_time(raw, server_tz)) else {
        return server_now(server_tz, now);
    };

    match client_tz.and_then(parse_timezone) {
        Some(tz) => parsed.with_timezone(&tz).fixed_offset(),
        None => parsed,
    }
}
