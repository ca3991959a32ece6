use super::Advice;
use crate::analysis::AnalysisResult;

pub const FALLBACK_NOTE: &str = "AI analysis unavailable. Showing statistical analysis only.";

/// Deterministic advice built only from the analysis.
pub fn fallback_advice(analysis: &AnalysisResult) -> Advice {
    let first_step = if analysis.emergency_alert {
        "SEEK IMMEDIATE MEDICAL ATTENTION"
    } else {
        "Continue monitoring vitals regularly"
    };

    Advice {
        risk_assessment: analysis.risk_level.as_str().to_string(),
        heart_disease_risk: Some(analysis.concerns.join(". ")),
        key_findings: analysis
            .detected_diseases
            .iter()
            .map(|d| format!("{}: {}", d.name, d.description))
            .collect(),
        recommendations: vec![
            first_step.to_string(),
            "Consult with a cardiologist about these findings".to_string(),
            "Maintain medication schedule and healthy lifestyle".to_string(),
            "Keep tracking vitals daily for pattern changes".to_string(),
        ],
        emergency_alert: Some(analysis.emergency_alert),
        summary: Some(format!(
            "Analysis based on {} readings. Overall Risk: {}. {} conditions detected.",
            analysis.total_readings,
            analysis.risk_level,
            analysis.detected_diseases.len()
        )),
        raw_response: false,
        ai_timeout: true,
        note: Some(FALLBACK_NOTE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_readings, AnalysisConfig};
    use crate::db::models::Reading;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn summarises_detections() {
        let base = Utc.with_ymd_and_hms(2026, 3, 3, 3, 0, 0).unwrap();
        let readings = (0..20)
            .map(|i| Reading {
                id: None,
                patient_id: "p".into(),
                timestamp: base + Duration::minutes(i),
                heart_rate: if i < 5 { 112 } else { 76 },
                oxygen_level: 97,
                temperature: 98.4,
                device_id: None,
            })
            .collect();
        let analysis = analyze_readings(readings, &AnalysisConfig::default()).unwrap();

        let advice = fallback_advice(&analysis);

        assert_eq!(advice.risk_assessment, "HIGH");
        assert_eq!(
            advice.key_findings,
            vec!["Tachycardia: Elevated heart rate (>100 bpm) detected in 25% of readings"]
        );
        assert_eq!(advice.recommendations[0], "Continue monitoring vitals regularly");
        assert_eq!(
            advice.summary.as_deref(),
            Some("Analysis based on 20 readings. Overall Risk: HIGH. 1 conditions detected.")
        );
        assert!(advice.ai_timeout);
        assert_eq!(advice.emergency_alert, Some(false));
    }
}
