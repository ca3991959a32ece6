use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::config::AnalysisConfig;
use crate::analysis::detection::{detect, ConditionBreakdown, ConditionCounts, DetectedCondition};
use crate::analysis::error::AnalysisError;
use crate::analysis::risk::{resolve_risk, RiskLevel};
use crate::analysis::thresholds::{classify_reading, Severity, VitalSign};
use crate::db::models::Reading;

const HEALTHY_CONCERN: &str = "All vitals within normal ranges. Keep up the healthy lifestyle!";

/// Non-empty readings of one patient, newest first.
#[derive(Debug, Clone)]
pub struct Window {
    readings: Vec<Reading>,
}

impl Window {
    pub fn new(mut readings: Vec<Reading>) -> Result<Self, AnalysisError> {
        if readings.is_empty() {
            return Err(AnalysisError::NoData);
        }
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Self { readings })
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.readings[self.readings.len() - 1].timestamp
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.readings[0].timestamp
    }
}

/// Audit entry for a reading classified HIGH or CRITICAL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalReading {
    pub timestamp: DateTime<Utc>,
    pub condition: String,
    pub vital_sign: VitalSign,
    pub value: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Averages {
    pub heart_rate: u32,
    pub oxygen_level: u32,
    /// °F, one decimal.
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub total_readings: u64,
    pub averages: Averages,
    #[serde(skip)]
    pub condition_counts: ConditionCounts,
    pub detected_diseases: Vec<DetectedCondition>,
    pub risk_level: RiskLevel,
    pub emergency_alert: bool,
    pub critical_readings: Vec<CriticalReading>,
    pub concerns: Vec<String>,
}

impl AnalysisResult {
    pub fn breakdown(&self) -> ConditionBreakdown {
        ConditionBreakdown::from(&self.condition_counts)
    }
}

/// Partial fold over a slice of readings. Tallies merge by summation.
#[derive(Debug, Clone, Default, PartialEq)]
struct WindowTally {
    len: u64,
    counts: ConditionCounts,
    heart_rate_sum: u64,
    oxygen_sum: u64,
    temperature_tenths: i64,
    critical: Vec<CriticalReading>,
}

impl WindowTally {
    fn push(&mut self, reading: &Reading, critical_cap: usize) {
        let classification = classify_reading(reading);
        self.counts.record(&classification);
        self.len += 1;
        self.heart_rate_sum += u64::from(reading.heart_rate);
        self.oxygen_sum += u64::from(reading.oxygen_level);
        self.temperature_tenths += (reading.temperature * 10.0).round() as i64;

        for (tier, value) in classification.with_values(reading) {
            let severity = tier.severity();
            if severity.is_alarming() && self.critical.len() < critical_cap {
                self.critical.push(CriticalReading {
                    timestamp: reading.timestamp,
                    condition: tier.label().to_string(),
                    vital_sign: tier.vital_sign(),
                    value,
                    severity,
                });
            }
        }
    }

    /// `other` must cover readings that come after `self`'s.
    fn append(&mut self, other: WindowTally, critical_cap: usize) {
        self.len += other.len;
        self.counts += &other.counts;
        self.heart_rate_sum += other.heart_rate_sum;
        self.oxygen_sum += other.oxygen_sum;
        self.temperature_tenths += other.temperature_tenths;

        let room = critical_cap.saturating_sub(self.critical.len());
        self.critical.extend(other.critical.into_iter().take(room));
    }

    fn averages(&self) -> Averages {
        if self.len == 0 {
            return Averages {
                heart_rate: 0,
                oxygen_level: 0,
                temperature: 0.0,
            };
        }
        let n = self.len;
        Averages {
            heart_rate: ((self.heart_rate_sum * 2 + n) / (n * 2)) as u32,
            oxygen_level: ((self.oxygen_sum * 2 + n) / (n * 2)) as u32,
            temperature: (self.temperature_tenths as f64 / n as f64).round() / 10.0,
        }
    }
}

fn tally_sequential(readings: &[Reading], critical_cap: usize) -> WindowTally {
    let mut tally = WindowTally::default();
    for reading in readings {
        tally.push(reading, critical_cap);
    }
    tally
}

fn tally_parallel(readings: &[Reading], critical_cap: usize, chunk_size: usize) -> WindowTally {
    let partials: Vec<WindowTally> = readings
        .par_chunks(chunk_size.max(1))
        .map(|chunk| tally_sequential(chunk, critical_cap))
        .collect();

    // Merge in chunk order so the critical list keeps window order.
    let mut tally = WindowTally::default();
    for partial in partials {
        tally.append(partial, critical_cap);
    }
    tally
}

fn tally_window(window: &Window, config: &AnalysisConfig) -> WindowTally {
    let readings = window.readings();
    if readings.len() >= config.parallel_min_readings.max(1) {
        let workers = rayon::current_num_threads().max(1);
        tally_parallel(readings, config.critical_readings_cap, readings.len().div_ceil(workers))
    } else {
        tally_sequential(readings, config.critical_readings_cap)
    }
}

/// Classify, aggregate and resolve one window.
pub fn analyze_window(window: &Window, config: &AnalysisConfig) -> AnalysisResult {
    // Step 1: fold per-reading classifications into counts
    let tally = tally_window(window, config);

    // Step 2: triggers are evaluated on the merged counts only
    let detection = detect(&tally.counts, tally.len, &config.triggers);

    // Step 3: composite risk
    let risk_level = resolve_risk(&detection.conditions, detection.emergency_alert);

    let concerns = if detection.conditions.is_empty() {
        vec![HEALTHY_CONCERN.to_string()]
    } else {
        detection
            .conditions
            .iter()
            .map(|condition| condition.description.clone())
            .collect()
    };

    AnalysisResult {
        total_readings: tally.len,
        averages: tally.averages(),
        condition_counts: tally.counts,
        detected_diseases: detection.conditions,
        risk_level,
        emergency_alert: detection.emergency_alert,
        critical_readings: tally.critical,
        concerns,
    }
}

pub fn analyze_readings(
    readings: Vec<Reading>,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let window = Window::new(readings)?;
    Ok(analyze_window(&window, config))
}
