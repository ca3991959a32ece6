//! Per-reading threshold classification.
//!
//! Every vital sign has an ordered table of `(band, tier)` rows. A value is
//! classified by walking its table from the most severe row down and taking
//! the first band that contains it. Each table ends with a catch-all row, so
//! classification is total and yields exactly one tier per vital sign.

use serde::{Deserialize, Serialize};

use crate::db::models::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Normal,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Moderate => "MODERATE",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// HIGH and CRITICAL readings go to the critical-readings audit list.
    pub fn is_alarming(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VitalSign {
    HeartRate,
    OxygenLevel,
    Temperature,
}

impl VitalSign {
    pub const ALL: [VitalSign; 3] = [
        VitalSign::HeartRate,
        VitalSign::OxygenLevel,
        VitalSign::Temperature,
    ];

    pub fn tiers(&self) -> &'static [TierRule] {
        match self {
            VitalSign::HeartRate => HEART_RATE_TIERS,
            VitalSign::OxygenLevel => OXYGEN_TIERS,
            VitalSign::Temperature => TEMPERATURE_TIERS,
        }
    }

    pub fn normal_tier(&self) -> Tier {
        match self {
            VitalSign::HeartRate => Tier::NormalHeartRate,
            VitalSign::OxygenLevel => Tier::NormalOxygen,
            VitalSign::Temperature => Tier::NormalTemperature,
        }
    }
}

/// Mutually exclusive classification bucket for one vital sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    AtrialFibrillation,
    AtrialFlutter,
    SevereTachycardia,
    Tachycardia,
    SickSinus,
    SevereBradycardia,
    Bradycardia,
    CoronaryRisk,
    NormalHeartRate,
    SevereHypoxemia,
    ModerateHypoxemia,
    MildHypoxemia,
    NormalOxygen,
    HighFever,
    Fever,
    Hypothermia,
    NormalTemperature,
}

pub(crate) const TIER_COUNT: usize = 17;

impl Tier {
    pub const ALL: [Tier; TIER_COUNT] = [
        Tier::AtrialFibrillation,
        Tier::AtrialFlutter,
        Tier::SevereTachycardia,
        Tier::Tachycardia,
        Tier::SickSinus,
        Tier::SevereBradycardia,
        Tier::Bradycardia,
        Tier::CoronaryRisk,
        Tier::NormalHeartRate,
        Tier::SevereHypoxemia,
        Tier::ModerateHypoxemia,
        Tier::MildHypoxemia,
        Tier::NormalOxygen,
        Tier::HighFever,
        Tier::Fever,
        Tier::Hypothermia,
        Tier::NormalTemperature,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn vital_sign(&self) -> VitalSign {
        match self {
            Tier::AtrialFibrillation
            | Tier::AtrialFlutter
            | Tier::SevereTachycardia
            | Tier::Tachycardia
            | Tier::SickSinus
            | Tier::SevereBradycardia
            | Tier::Bradycardia
            | Tier::CoronaryRisk
            | Tier::NormalHeartRate => VitalSign::HeartRate,
            Tier::SevereHypoxemia
            | Tier::ModerateHypoxemia
            | Tier::MildHypoxemia
            | Tier::NormalOxygen => VitalSign::OxygenLevel,
            Tier::HighFever | Tier::Fever | Tier::Hypothermia | Tier::NormalTemperature => {
                VitalSign::Temperature
            }
        }
    }

    /// Human-readable condition name used in the audit list.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::AtrialFibrillation => "Atrial Fibrillation",
            Tier::AtrialFlutter => "Atrial Flutter",
            Tier::SevereTachycardia => "Severe Tachycardia",
            Tier::Tachycardia => "Tachycardia",
            Tier::SickSinus => "Sick Sinus Syndrome",
            Tier::SevereBradycardia => "Severe Bradycardia",
            Tier::Bradycardia => "Bradycardia",
            Tier::CoronaryRisk => "Coronary Risk Pattern",
            Tier::NormalHeartRate => "Normal Heart Rate",
            Tier::SevereHypoxemia => "Severe Hypoxemia",
            Tier::ModerateHypoxemia => "Moderate Hypoxemia",
            Tier::MildHypoxemia => "Mild Hypoxemia",
            Tier::NormalOxygen => "Normal SpO2",
            Tier::HighFever => "High Fever",
            Tier::Fever => "Fever",
            Tier::Hypothermia => "Hypothermia",
            Tier::NormalTemperature => "Normal Temperature",
        }
    }

    /// Key of this tier inside its family's breakdown map.
    pub fn breakdown_key(&self) -> &'static str {
        match self {
            Tier::AtrialFibrillation => "atrialFibrillation",
            Tier::AtrialFlutter => "atrialFlutter",
            Tier::SevereTachycardia => "severeTachycardia",
            Tier::Tachycardia => "tachycardia",
            Tier::SickSinus => "sickSinus",
            Tier::SevereBradycardia => "severeBradycardia",
            Tier::Bradycardia => "bradycardia",
            Tier::CoronaryRisk => "coronaryRisk",
            Tier::SevereHypoxemia => "severeHypoxemia",
            Tier::ModerateHypoxemia => "moderateHypoxemia",
            Tier::MildHypoxemia => "mildHypoxemia",
            Tier::HighFever => "highFever",
            Tier::Fever => "fever",
            Tier::Hypothermia => "hypothermia",
            Tier::NormalHeartRate | Tier::NormalOxygen | Tier::NormalTemperature => "normal",
        }
    }

    /// Severity of a single reading in this tier. Tachycardia and Bradycardia
    /// only become HIGH once detected across a window.
    pub fn severity(&self) -> Severity {
        match self {
            Tier::AtrialFibrillation
            | Tier::AtrialFlutter
            | Tier::SickSinus
            | Tier::SevereHypoxemia => Severity::Critical,
            Tier::SevereTachycardia
            | Tier::SevereBradycardia
            | Tier::ModerateHypoxemia
            | Tier::HighFever
            | Tier::Hypothermia => Severity::High,
            Tier::Tachycardia
            | Tier::Bradycardia
            | Tier::CoronaryRisk
            | Tier::MildHypoxemia
            | Tier::Fever => Severity::Moderate,
            Tier::NormalHeartRate | Tier::NormalOxygen | Tier::NormalTemperature => {
                Severity::Normal
            }
        }
    }
}

/// Value range a tier row matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    AtLeast(f64),
    Above(f64),
    Below(f64),
    /// Outside the closed interval `[low, high]`.
    Outside(f64, f64),
    Any,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Band::AtLeast(limit) => value >= limit,
            Band::Above(limit) => value > limit,
            Band::Below(limit) => value < limit,
            Band::Outside(low, high) => value < low || value > high,
            Band::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TierRule {
    pub band: Band,
    pub tier: Tier,
}

pub static HEART_RATE_TIERS: &[TierRule] = &[
    TierRule { band: Band::AtLeast(250.0), tier: Tier::AtrialFibrillation },
    TierRule { band: Band::AtLeast(150.0), tier: Tier::AtrialFlutter },
    TierRule { band: Band::AtLeast(120.0), tier: Tier::SevereTachycardia },
    TierRule { band: Band::Above(100.0), tier: Tier::Tachycardia },
    TierRule { band: Band::Below(45.0), tier: Tier::SickSinus },
    TierRule { band: Band::Below(50.0), tier: Tier::SevereBradycardia },
    TierRule { band: Band::Below(60.0), tier: Tier::Bradycardia },
    TierRule { band: Band::Outside(70.0, 80.0), tier: Tier::CoronaryRisk },
    TierRule { band: Band::Any, tier: Tier::NormalHeartRate },
];

pub static OXYGEN_TIERS: &[TierRule] = &[
    TierRule { band: Band::Below(85.0), tier: Tier::SevereHypoxemia },
    TierRule { band: Band::Below(90.0), tier: Tier::ModerateHypoxemia },
    TierRule { band: Band::Below(94.0), tier: Tier::MildHypoxemia },
    TierRule { band: Band::Any, tier: Tier::NormalOxygen },
];

pub static TEMPERATURE_TIERS: &[TierRule] = &[
    TierRule { band: Band::AtLeast(102.0), tier: Tier::HighFever },
    TierRule { band: Band::AtLeast(100.4), tier: Tier::Fever },
    TierRule { band: Band::Below(96.8), tier: Tier::Hypothermia },
    TierRule { band: Band::Any, tier: Tier::NormalTemperature },
];

/// First matching row wins.
pub fn classify(sign: VitalSign, value: f64) -> Tier {
    sign.tiers()
        .iter()
        .find(|rule| rule.band.contains(value))
        .map(|rule| rule.tier)
        .unwrap_or_else(|| sign.normal_tier())
}

/// The three tiers a single reading falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub heart_rate: Tier,
    pub oxygen_level: Tier,
    pub temperature: Tier,
}

impl Classification {
    /// Tiers paired with the measured value, in heart rate, oxygen, temperature order.
    pub fn with_values(&self, reading: &Reading) -> [(Tier, f64); 3] {
        [
            (self.heart_rate, f64::from(reading.heart_rate)),
            (self.oxygen_level, f64::from(reading.oxygen_level)),
            (self.temperature, reading.temperature),
        ]
    }
}

pub fn classify_reading(reading: &Reading) -> Classification {
    Classification {
        heart_rate: classify(VitalSign::HeartRate, f64::from(reading.heart_rate)),
        oxygen_level: classify(VitalSign::OxygenLevel, f64::from(reading.oxygen_level)),
        temperature: classify(VitalSign::Temperature, reading.temperature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr(value: u32) -> Tier {
        classify(VitalSign::HeartRate, f64::from(value))
    }

    #[test]
    fn heart_rate_boundaries() {
        assert_eq!(hr(250), Tier::AtrialFibrillation);
        assert_eq!(hr(249), Tier::AtrialFlutter);
        assert_eq!(hr(150), Tier::AtrialFlutter);
        assert_eq!(hr(149), Tier::SevereTachycardia);
        assert_eq!(hr(120), Tier::SevereTachycardia);
        assert_eq!(hr(119), Tier::Tachycardia);
        assert_eq!(hr(101), Tier::Tachycardia);
        assert_eq!(hr(100), Tier::CoronaryRisk);
        assert_eq!(hr(81), Tier::CoronaryRisk);
        assert_eq!(hr(80), Tier::NormalHeartRate);
        assert_eq!(hr(70), Tier::NormalHeartRate);
        assert_eq!(hr(69), Tier::CoronaryRisk);
        assert_eq!(hr(60), Tier::CoronaryRisk);
        assert_eq!(hr(59), Tier::Bradycardia);
        assert_eq!(hr(50), Tier::Bradycardia);
        assert_eq!(hr(49), Tier::SevereBradycardia);
        assert_eq!(hr(45), Tier::SevereBradycardia);
        assert_eq!(hr(44), Tier::SickSinus);
    }

    #[test]
    fn oxygen_boundaries() {
        let ox = |v: f64| classify(VitalSign::OxygenLevel, v);
        assert_eq!(ox(84.0), Tier::SevereHypoxemia);
        assert_eq!(ox(85.0), Tier::ModerateHypoxemia);
        assert_eq!(ox(89.0), Tier::ModerateHypoxemia);
        assert_eq!(ox(90.0), Tier::MildHypoxemia);
        assert_eq!(ox(93.0), Tier::MildHypoxemia);
        assert_eq!(ox(94.0), Tier::NormalOxygen);
        assert_eq!(ox(100.0), Tier::NormalOxygen);
    }

    #[test]
    fn temperature_boundaries() {
        let temp = |v: f64| classify(VitalSign::Temperature, v);
        assert_eq!(temp(102.0), Tier::HighFever);
        assert_eq!(temp(101.9), Tier::Fever);
        assert_eq!(temp(100.4), Tier::Fever);
        assert_eq!(temp(100.3), Tier::NormalTemperature);
        assert_eq!(temp(96.8), Tier::NormalTemperature);
        assert_eq!(temp(96.7), Tier::Hypothermia);
    }

    #[test]
    fn every_table_ends_with_catch_all() {
        for sign in VitalSign::ALL {
            let last = sign.tiers().last().unwrap();
            assert_eq!(last.band, Band::Any);
            assert_eq!(last.tier, sign.normal_tier());
        }
    }

    #[test]
    fn classification_is_total_and_stays_in_family() {
        for value in 0..=400 {
            for sign in VitalSign::ALL {
                let tier = classify(sign, f64::from(value));
                assert_eq!(tier.vital_sign(), sign);
                let matching = sign
                    .tiers()
                    .iter()
                    .position(|rule| rule.band.contains(f64::from(value)));
                assert_eq!(matching.map(|i| sign.tiers()[i].tier), Some(tier));
            }
        }
    }

    #[test]
    fn tier_indices_follow_all_order() {
        for (position, tier) in Tier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), position);
        }
    }

    #[test]
    fn tachycardia_reading_is_not_alarming() {
        assert!(!Tier::Tachycardia.severity().is_alarming());
        assert!(!Tier::Bradycardia.severity().is_alarming());
        assert!(Tier::SevereTachycardia.severity().is_alarming());
        assert!(Tier::SickSinus.severity().is_alarming());
    }
}
