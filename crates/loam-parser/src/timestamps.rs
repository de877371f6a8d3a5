//! Lenient parsing and canonical formatting of org timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Canonical inactive org timestamp, e.g. `[2024-01-15 Mon 10:30]`.
const ORG_FORMAT: &str = "[%Y-%m-%d %a %H:%M]";

/// Parse a timestamp as found in `CREATED` / `UPDATED` / `EMBED_AT`
/// properties. Accepts the org bracket form, RFC 3339, and a few bare
/// date/datetime shapes. Returns `None` for anything else; an
/// unparseable date is an absence, never a parse failure.
pub fn parse_org_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, ORG_FORMAT) {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "[%Y-%m-%d %a]") {
        return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Format a timestamp in the canonical org bracket form.
pub fn format_org_timestamp(at: DateTime<Utc>) -> String {
    at.format(ORG_FORMAT).to_string()
}
