//! Window-level condition detection.
//!
//! Per-tier counts are folded over a window, then every tier whose share of the
//! window strictly exceeds its trigger becomes a [`DetectedCondition`].

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use super::config::TriggerPolicy;
use super::thresholds::{Classification, Severity, Tier, VitalSign, TIER_COUNT};

/// Occurrence count per tier within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionCounts {
    counts: [u64; TIER_COUNT],
}

impl Default for ConditionCounts {
    fn default() -> Self {
        Self {
            counts: [0; TIER_COUNT],
        }
    }
}

impl ConditionCounts {
    pub fn record(&mut self, classification: &Classification) {
        self.counts[classification.heart_rate.index()] += 1;
        self.counts[classification.oxygen_level.index()] += 1;
        self.counts[classification.temperature.index()] += 1;
    }

    pub fn get(&self, tier: Tier) -> u64 {
        self.counts[tier.index()]
    }

    pub fn merge(&mut self, other: &ConditionCounts) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    /// Sum over one vital sign's tiers; equals the window length.
    pub fn family_total(&self, sign: VitalSign) -> u64 {
        Tier::ALL
            .iter()
            .filter(|tier| tier.vital_sign() == sign)
            .map(|tier| self.get(*tier))
            .sum()
    }

    /// Counts of one vital sign keyed by tier, e.g. `{"tachycardia": 3, "normal": 90}`.
    pub fn breakdown(&self, sign: VitalSign) -> BTreeMap<&'static str, u64> {
        Tier::ALL
            .iter()
            .filter(|tier| tier.vital_sign() == sign)
            .map(|tier| (tier.breakdown_key(), self.get(*tier)))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn with(entries: &[(Tier, u64)]) -> Self {
        let mut counts = Self::default();
        for (tier, count) in entries {
            counts.counts[tier.index()] = *count;
        }
        counts
    }
}

impl AddAssign<&ConditionCounts> for ConditionCounts {
    fn add_assign(&mut self, rhs: &ConditionCounts) {
        self.merge(rhs);
    }
}

/// Per-vital-sign count maps exposed alongside an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionBreakdown {
    pub heart_rate: BTreeMap<String, u64>,
    pub oxygen_level: BTreeMap<String, u64>,
    pub temperature: BTreeMap<String, u64>,
}

impl From<&ConditionCounts> for ConditionBreakdown {
    fn from(counts: &ConditionCounts) -> Self {
        let owned = |sign| {
            counts
                .breakdown(sign)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect()
        };
        Self {
            heart_rate: owned(VitalSign::HeartRate),
            oxygen_level: owned(VitalSign::OxygenLevel),
            temperature: owned(VitalSign::Temperature),
        }
    }
}

/// One row of the detection table.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRule {
    pub tier: Tier,
    pub name: &'static str,
    pub severity: Severity,
    pub phrase: &'static str,
    pub seeds_emergency: bool,
}

/// Evaluated in this order; detected conditions keep it.
pub static DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule {
        tier: Tier::AtrialFibrillation,
        name: "Atrial Fibrillation",
        severity: Severity::Critical,
        phrase: "Extremely rapid heart rate (250+ bpm)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::AtrialFlutter,
        name: "Atrial Flutter",
        severity: Severity::Critical,
        phrase: "Rapid atrial rhythm (150-250 bpm)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::SickSinus,
        name: "Sick Sinus Syndrome",
        severity: Severity::Critical,
        phrase: "Dangerously slow heart rate (<45 bpm)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::SevereTachycardia,
        name: "Severe Tachycardia",
        severity: Severity::High,
        phrase: "Very elevated heart rate (120+ bpm)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::Tachycardia,
        name: "Tachycardia",
        severity: Severity::High,
        phrase: "Elevated heart rate (>100 bpm)",
        seeds_emergency: false,
    },
    DetectionRule {
        tier: Tier::SevereBradycardia,
        name: "Severe Bradycardia",
        severity: Severity::High,
        phrase: "Very slow heart rate (<50 bpm)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::Bradycardia,
        name: "Bradycardia",
        severity: Severity::High,
        phrase: "Slow heart rate (<60 bpm)",
        seeds_emergency: false,
    },
    DetectionRule {
        tier: Tier::CoronaryRisk,
        name: "Coronary Risk Pattern",
        severity: Severity::Moderate,
        phrase: "Heart rate outside the 70-80 bpm range",
        seeds_emergency: false,
    },
    DetectionRule {
        tier: Tier::SevereHypoxemia,
        name: "Severe Hypoxemia",
        severity: Severity::Critical,
        phrase: "Critically low oxygen levels (<85%)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::ModerateHypoxemia,
        name: "Moderate Hypoxemia",
        severity: Severity::High,
        phrase: "Low oxygen levels (<90%)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::MildHypoxemia,
        name: "Mild Hypoxemia",
        severity: Severity::Moderate,
        phrase: "Below-normal oxygen levels (<94%)",
        seeds_emergency: false,
    },
    DetectionRule {
        tier: Tier::HighFever,
        name: "Persistent High Fever",
        severity: Severity::High,
        phrase: "High fever (102°F+)",
        seeds_emergency: true,
    },
    DetectionRule {
        tier: Tier::Fever,
        name: "Persistent Fever",
        severity: Severity::Moderate,
        phrase: "Fever (100.4°F+)",
        seeds_emergency: false,
    },
    DetectionRule {
        tier: Tier::Hypothermia,
        name: "Hypothermia Risk",
        severity: Severity::High,
        phrase: "Low body temperature (<96.8°F)",
        seeds_emergency: true,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCondition {
    pub name: String,
    pub severity: Severity,
    /// Share of the window, rounded to the nearest integer percent.
    pub percentage: u32,
    pub affected_readings: u64,
    pub description: String,
    pub tier: Tier,
    pub vital_sign: VitalSign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub conditions: Vec<DetectedCondition>,
    pub emergency_alert: bool,
}

pub fn rounded_percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    // round-half-up on exact integers
    ((count * 200 + total) / (total * 2)) as u32
}

pub fn detect(counts: &ConditionCounts, total: u64, policy: &TriggerPolicy) -> Detection {
    let mut conditions = Vec::new();
    let mut emergency_alert = false;

    for rule in DETECTION_RULES {
        let count = counts.get(rule.tier);
        if !policy.is_triggered(rule.tier, count, total) {
            continue;
        }

        let percentage = rounded_percentage(count, total);
        emergency_alert |= rule.seeds_emergency || rule.severity == Severity::Critical;
        conditions.push(DetectedCondition {
            name: rule.name.to_string(),
            severity: rule.severity,
            percentage,
            affected_readings: count,
            description: format!("{} detected in {}% of readings", rule.phrase, percentage),
            tier: rule.tier,
            vital_sign: rule.tier.vital_sign(),
        });
    }

    Detection {
        conditions,
        emergency_alert,
    }
}
