use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::PatientStatus;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} value {value} out of range"))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_patient_status(value: &str) -> Result<PatientStatus> {
    match value {
        "Active" => Ok(PatientStatus::Active),
        "Inactive" => Ok(PatientStatus::Inactive),
        other => Err(anyhow!("unknown patient status {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_like_instants() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);

        assert!(format_datetime(&earlier) < format_datetime(&later));
        assert_eq!(
            parse_datetime(&format_datetime(&later), "timestamp").unwrap(),
            later
        );
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(to_u64(-1, "alerts").is_err());
        assert_eq!(to_u32(72, "heart_rate").unwrap(), 72);
    }
}
