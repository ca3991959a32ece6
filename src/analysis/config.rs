use serde::{Deserialize, Serialize};

use super::thresholds::Tier;

/// Tunable knobs of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Trailing window fetched for a patient analysis.
    pub window_days: u32,

    /// Number of critical readings exposed on the result.
    pub critical_readings_cap: usize,

    /// Windows at least this long are folded in parallel.
    pub parallel_min_readings: usize,

    pub triggers: TriggerPolicy,
    pub bounds: PlausibilityBounds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_days: 60,
            critical_readings_cap: 10,
            parallel_min_readings: 4096,
            triggers: TriggerPolicy::default(),
            bounds: PlausibilityBounds::default(),
        }
    }
}

/// Which trigger applies to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerClass {
    Critical,
    High,
    RateDeviation,
    CoronaryRisk,
    MildHypoxemia,
    Fever,
}

impl TriggerClass {
    /// Normal tiers never trigger.
    pub fn of(tier: Tier) -> Option<TriggerClass> {
        match tier {
            Tier::AtrialFibrillation
            | Tier::AtrialFlutter
            | Tier::SickSinus
            | Tier::SevereHypoxemia => Some(TriggerClass::Critical),
            Tier::SevereTachycardia
            | Tier::SevereBradycardia
            | Tier::ModerateHypoxemia
            | Tier::HighFever
            | Tier::Hypothermia => Some(TriggerClass::High),
            Tier::Tachycardia | Tier::Bradycardia => Some(TriggerClass::RateDeviation),
            Tier::CoronaryRisk => Some(TriggerClass::CoronaryRisk),
            Tier::MildHypoxemia => Some(TriggerClass::MildHypoxemia),
            Tier::Fever => Some(TriggerClass::Fever),
            Tier::NormalHeartRate | Tier::NormalOxygen | Tier::NormalTemperature => None,
        }
    }
}

/// Percentage a tier's share of the window must strictly exceed to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerPolicy {
    pub critical: u32,
    pub high: u32,
    pub rate_deviation: u32,
    pub coronary_risk: u32,
    pub mild_hypoxemia: u32,
    pub fever: u32,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            critical: 5,
            high: 15,
            rate_deviation: 20,
            coronary_risk: 30,
            mild_hypoxemia: 25,
            fever: 25,
        }
    }
}

impl TriggerPolicy {
    pub fn percent_for(&self, class: TriggerClass) -> u32 {
        match class {
            TriggerClass::Critical => self.critical,
            TriggerClass::High => self.high,
            TriggerClass::RateDeviation => self.rate_deviation,
            TriggerClass::CoronaryRisk => self.coronary_risk,
            TriggerClass::MildHypoxemia => self.mild_hypoxemia,
            TriggerClass::Fever => self.fever,
        }
    }

    /// `count / total > percent / 100`, compared without floating point.
    pub fn is_triggered(&self, tier: Tier, count: u64, total: u64) -> bool {
        let Some(class) = TriggerClass::of(tier) else {
            return false;
        };
        if total == 0 {
            return false;
        }
        u128::from(count) * 100 > u128::from(total) * u128::from(self.percent_for(class))
    }
}

/// Physically plausible ranges; readings outside are excluded at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlausibilityBounds {
    pub heart_rate_min: u32,
    pub heart_rate_max: u32,
    pub oxygen_min: u32,
    pub oxygen_max: u32,
    pub temperature_min_f: f64,
    pub temperature_max_f: f64,
}

impl Default for PlausibilityBounds {
    fn default() -> Self {
        Self {
            heart_rate_min: 30,
            heart_rate_max: 300,
            oxygen_min: 70,
            oxygen_max: 100,
            temperature_min_f: 86.0,
            temperature_max_f: 113.0,
        }
    }
}
