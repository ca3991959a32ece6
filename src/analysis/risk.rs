use serde::{Deserialize, Serialize};

use super::detection::DetectedCondition;
use super::thresholds::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn resolve_risk(conditions: &[DetectedCondition], emergency_alert: bool) -> RiskLevel {
    let worst = conditions.iter().map(|c| c.severity).max();

    if emergency_alert || worst == Some(Severity::Critical) {
        RiskLevel::Critical
    } else if worst == Some(Severity::High) {
        RiskLevel::High
    } else if worst.is_some() {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}
