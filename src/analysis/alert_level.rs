//! Per-reading derived fields stored alongside each reading.

use serde::{Deserialize, Serialize};

use crate::db::models::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(AlertLevel::Normal),
            "warning" => Some(AlertLevel::Warning),
            "critical" => Some(AlertLevel::Critical),
            _ => None,
        }
    }
}

pub fn alert_level(reading: &Reading) -> AlertLevel {
    let hr = reading.heart_rate;
    let ox = reading.oxygen_level;
    let temp = reading.temperature;

    if hr < 50 || hr > 120 || ox < 90 || temp < 97.0 || temp > 100.4 {
        AlertLevel::Critical
    } else if hr < 60 || hr > 100 || ox < 95 || temp < 97.5 || temp > 99.5 {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

pub fn is_normal(reading: &Reading) -> bool {
    (60..=100).contains(&reading.heart_rate)
        && reading.oxygen_level >= 95
        && (97.5..=99.5).contains(&reading.temperature)
}
