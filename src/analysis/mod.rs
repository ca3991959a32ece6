pub mod alert_level;
pub mod algorithm;
pub mod config;
pub mod detection;
pub mod error;
pub mod ingest;
pub mod risk;
pub mod thresholds;

pub use alert_level::{alert_level, is_normal, AlertLevel};
pub use algorithm::{analyze_readings, analyze_window, AnalysisResult, Averages, CriticalReading, Window};
pub use config::{AnalysisConfig, PlausibilityBounds, TriggerPolicy};
pub use detection::{ConditionBreakdown, ConditionCounts, DetectedCondition};
pub use error::{AnalysisError, Stage};
pub use ingest::{
    check_bounds, sanitize_batch, sanitize_reading, screen_window, ExclusionSummary, RawReading,
    Rejection, TemperatureUnit,
};
pub use risk::RiskLevel;
pub use thresholds::{Severity, Tier, VitalSign};
