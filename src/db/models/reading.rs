//! Vital-sign reading data model.
//!
//! Represents a single measurement of heart rate, blood oxygen and body
//! temperature taken for a patient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AlertLevel;

/// One immutable measurement. Temperature is always stored in Fahrenheit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: Option<i64>,
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    /// Beats per minute.
    pub heart_rate: u32,
    /// SpO2 percentage.
    pub oxygen_level: u32,
    /// Degrees Fahrenheit, one decimal.
    pub temperature: f64,
    pub device_id: Option<String>,
}

/// What the store derived for a reading when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    pub id: i64,
    pub alert_level: AlertLevel,
    pub is_normal: bool,
}
