//! Sanitising raw readings before they reach the store or the classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::config::PlausibilityBounds;
use crate::db::models::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

/// A reading as a device or import reports it; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    pub timestamp: Option<DateTime<Utc>>,
    pub heart_rate: Option<f64>,
    pub oxygen_level: Option<f64>,
    pub temperature: Option<f64>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("{field} value {value} is outside plausible bounds")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionSummary {
    pub missing_fields: u64,
    pub out_of_range: u64,
}

impl ExclusionSummary {
    pub fn record(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::MissingField(_) => self.missing_fields += 1,
            Rejection::OutOfRange { .. } => self.out_of_range += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.missing_fields + self.out_of_range
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round_one_decimal(celsius * 9.0 / 5.0 + 32.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn to_whole(field: &'static str, value: f64) -> Result<u32, Rejection> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
        return Err(Rejection::OutOfRange { field, value });
    }
    Ok(rounded as u32)
}

fn within<T: PartialOrd + Into<f64> + Copy>(
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), Rejection> {
    if value < min || value > max {
        return Err(Rejection::OutOfRange {
            field,
            value: value.into(),
        });
    }
    Ok(())
}

/// Physical plausibility of an already-typed reading.
pub fn check_bounds(reading: &Reading, bounds: &PlausibilityBounds) -> Result<(), Rejection> {
    within(
        "heartRate",
        reading.heart_rate,
        bounds.heart_rate_min,
        bounds.heart_rate_max,
    )?;
    within(
        "oxygenLevel",
        reading.oxygen_level,
        bounds.oxygen_min,
        bounds.oxygen_max,
    )?;
    if !reading.temperature.is_finite() {
        return Err(Rejection::OutOfRange {
            field: "temperature",
            value: reading.temperature,
        });
    }
    within(
        "temperature",
        reading.temperature,
        bounds.temperature_min_f,
        bounds.temperature_max_f,
    )
}

pub fn sanitize_reading(
    patient_id: &str,
    raw: &RawReading,
    bounds: &PlausibilityBounds,
) -> Result<Reading, Rejection> {
    let timestamp = raw.timestamp.ok_or(Rejection::MissingField("timestamp"))?;
    let heart_rate = raw.heart_rate.ok_or(Rejection::MissingField("heartRate"))?;
    let oxygen_level = raw.oxygen_level.ok_or(Rejection::MissingField("oxygenLevel"))?;
    let temperature = raw.temperature.ok_or(Rejection::MissingField("temperature"))?;

    let reading = Reading {
        id: None,
        patient_id: patient_id.to_string(),
        timestamp,
        heart_rate: to_whole("heartRate", heart_rate)?,
        oxygen_level: to_whole("oxygenLevel", oxygen_level)?,
        temperature: match raw.temperature_unit {
            TemperatureUnit::Fahrenheit => round_one_decimal(temperature),
            TemperatureUnit::Celsius => celsius_to_fahrenheit(temperature),
        },
        device_id: raw.device_id.clone(),
    };
    check_bounds(&reading, bounds)?;
    Ok(reading)
}

/// Keeps every valid reading and counts the rest.
pub fn sanitize_batch(
    patient_id: &str,
    raw: &[RawReading],
    bounds: &PlausibilityBounds,
) -> (Vec<Reading>, ExclusionSummary) {
    let mut summary = ExclusionSummary::default();
    let mut accepted = Vec::with_capacity(raw.len());

    for item in raw {
        match sanitize_reading(patient_id, item, bounds) {
            Ok(reading) => accepted.push(reading),
            Err(rejection) => summary.record(&rejection),
        }
    }

    (accepted, summary)
}

/// Drops implausible readings from a fetched window, counting each one.
pub fn screen_window(
    readings: Vec<Reading>,
    bounds: &PlausibilityBounds,
) -> (Vec<Reading>, ExclusionSummary) {
    let mut summary = ExclusionSummary::default();
    let kept = readings
        .into_iter()
        .filter(|reading| match check_bounds(reading, bounds) {
            Ok(()) => true,
            Err(rejection) => {
                summary.record(&rejection);
                false
            }
        })
        .collect();
    (kept, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(hr: f64, ox: f64, temp: f64) -> RawReading {
        RawReading {
            timestamp: Some(Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap()),
            heart_rate: Some(hr),
            oxygen_level: Some(ox),
            temperature: Some(temp),
            ..RawReading::default()
        }
    }

    #[test]
    fn celsius_is_converted_to_one_decimal() {
        assert_eq!(celsius_to_fahrenheit(37.0), 98.6);
        assert_eq!(celsius_to_fahrenheit(38.9), 102.0);
        assert_eq!(celsius_to_fahrenheit(36.15), 97.1);
    }

    #[test]
    fn celsius_reading_is_stored_in_fahrenheit() {
        let mut item = raw(72.0, 97.0, 39.0);
        item.temperature_unit = TemperatureUnit::Celsius;
        let reading = sanitize_reading("p", &item, &PlausibilityBounds::default()).unwrap();
        assert_eq!(reading.temperature, 102.2);
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut item = raw(72.0, 97.0, 98.6);
        item.oxygen_level = None;
        assert_eq!(
            sanitize_reading("p", &item, &PlausibilityBounds::default()),
            Err(Rejection::MissingField("oxygenLevel"))
        );
    }

    #[test]
    fn extreme_but_plausible_heart_rate_is_kept() {
        let reading = sanitize_reading("p", &raw(260.0, 97.0, 98.6), &PlausibilityBounds::default());
        assert_eq!(reading.unwrap().heart_rate, 260);
    }

    #[test]
    fn batch_counts_every_exclusion() {
        let mut missing = raw(72.0, 97.0, 98.6);
        missing.timestamp = None;
        let batch = vec![
            raw(72.0, 97.0, 98.6),
            missing,
            raw(900.0, 97.0, 98.6),
            raw(72.0, 40.0, 98.6),
            raw(72.0, 97.0, 130.0),
            raw(f64::NAN, 97.0, 98.6),
        ];

        let (accepted, summary) = sanitize_batch("p", &batch, &PlausibilityBounds::default());

        assert_eq!(accepted.len(), 1);
        assert_eq!(summary.missing_fields, 1);
        assert_eq!(summary.out_of_range, 4);
        assert_eq!(summary.total() + accepted.len() as u64, batch.len() as u64);
    }

    #[test]
    fn negative_values_are_out_of_range() {
        assert!(matches!(
            sanitize_reading("p", &raw(-72.0, 97.0, 98.6), &PlausibilityBounds::default()),
            Err(Rejection::OutOfRange { field: "heartRate", .. })
        ));
    }

    #[test]
    fn screening_drops_and_counts_implausible_readings() {
        let good = sanitize_reading("p", &raw(72.0, 97.0, 98.6), &PlausibilityBounds::default())
            .unwrap();
        let mut flatline = good.clone();
        flatline.heart_rate = 0;
        let mut cold = good.clone();
        cold.temperature = 50.0;

        let (kept, summary) = screen_window(
            vec![good.clone(), flatline, cold, good.clone()],
            &PlausibilityBounds::default(),
        );

        assert_eq!(kept, vec![good.clone(), good]);
        assert_eq!(summary.out_of_range, 2);
        assert_eq!(summary.missing_fields, 0);
    }
}
