use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::advisory::Advice;
use crate::analysis::{AnalysisResult, ConditionBreakdown, ExclusionSummary};
use crate::escalation::{EscalationOutcome, Location};

pub const QUICK_NOTE: &str = "Quick analysis without escalation or advisory.";

/// Everything one analysis request returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub patient_id: String,
    pub analysis_date: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub analysis: AnalysisResult,
    pub breakdown: ConditionBreakdown,
    /// Readings dropped from the window before classification.
    pub excluded: ExclusionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    pub ai_timeout: bool,
    pub patient_location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub stored: u64,
    pub alerts: u64,
    pub excluded: ExclusionSummary,
}
