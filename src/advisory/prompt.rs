use std::fmt::Write;

use crate::analysis::{AnalysisResult, ConditionBreakdown};

const RESPONSE_SHAPE: &str = r#"{
  "riskAssessment": "<risk level>",
  "heartDiseaseRisk": "Professional medical explanation based on the patterns detected",
  "keyFindings": ["finding1", "finding2", "finding3"],
  "recommendations": ["action1", "action2", "action3"],
  "emergencyAlert": <true|false>,
  "summary": "Brief professional summary of the patient's condition"
}"#;

fn count(map: &std::collections::BTreeMap<String, u64>, key: &str) -> u64 {
    map.get(key).copied().unwrap_or(0)
}

/// Structured, deterministic prompt for the advisory generator.
pub fn build_prompt(
    patient_id: &str,
    analysis: &AnalysisResult,
    breakdown: &ConditionBreakdown,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a cardiovascular specialist. Analyze this patient data:"
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "PATIENT: {patient_id}");
    let _ = writeln!(prompt, "READINGS ANALYZED: {}", analysis.total_readings);
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "VITALS SUMMARY:");
    let _ = writeln!(prompt, "- Average Heart Rate: {} bpm", analysis.averages.heart_rate);
    let _ = writeln!(prompt, "- Average Oxygen Level: {}%", analysis.averages.oxygen_level);
    let _ = writeln!(prompt, "- Average Temperature: {:.1}°F", analysis.averages.temperature);
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "DETECTED CONDITIONS:");
    if analysis.detected_diseases.is_empty() {
        let _ = writeln!(prompt, "- No concerning patterns detected");
    }
    for disease in &analysis.detected_diseases {
        let _ = writeln!(
            prompt,
            "- {} ({}) - {}% of readings affected",
            disease.name,
            disease.severity.as_str(),
            disease.percentage
        );
    }
    let _ = writeln!(prompt);

    let hr = &breakdown.heart_rate;
    let _ = writeln!(prompt, "HEART RATE BREAKDOWN:");
    for (label, key) in [
        ("Normal (70-80 bpm)", "normal"),
        ("Coronary Risk (60-100 bpm, outside 70-80)", "coronaryRisk"),
        ("Tachycardia (>100 bpm)", "tachycardia"),
        ("Severe Tachycardia (120+ bpm)", "severeTachycardia"),
        ("Atrial Flutter (150-250 bpm)", "atrialFlutter"),
        ("Atrial Fibrillation (250+ bpm)", "atrialFibrillation"),
        ("Bradycardia (<60 bpm)", "bradycardia"),
        ("Severe Bradycardia (<50 bpm)", "severeBradycardia"),
        ("Sick Sinus (<45 bpm)", "sickSinus"),
    ] {
        let _ = writeln!(prompt, "- {label}: {} readings", count(hr, key));
    }
    let _ = writeln!(prompt);

    let ox = &breakdown.oxygen_level;
    let _ = writeln!(prompt, "OXYGEN BREAKDOWN:");
    for (label, key) in [
        ("Normal (94%+)", "normal"),
        ("Mild Hypoxemia (<94%)", "mildHypoxemia"),
        ("Moderate Hypoxemia (<90%)", "moderateHypoxemia"),
        ("Severe Hypoxemia (<85%)", "severeHypoxemia"),
    ] {
        let _ = writeln!(prompt, "- {label}: {} readings", count(ox, key));
    }
    let _ = writeln!(prompt);

    let temp = &breakdown.temperature;
    let _ = writeln!(prompt, "TEMPERATURE BREAKDOWN:");
    for (label, key) in [
        ("Normal (96.8-100.3°F)", "normal"),
        ("Fever (100.4°F+)", "fever"),
        ("High Fever (102°F+)", "highFever"),
        ("Hypothermia (<96.8°F)", "hypothermia"),
    ] {
        let _ = writeln!(prompt, "- {label}: {} readings", count(temp, key));
    }
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "RISK LEVEL: {}", analysis.risk_level);
    let _ = writeln!(
        prompt,
        "EMERGENCY: {}",
        if analysis.emergency_alert {
            "YES - IMMEDIATE MEDICAL ATTENTION REQUIRED"
        } else {
            "NO"
        }
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Provide medical recommendations in JSON:");
    let _ = write!(
        prompt,
        "{}",
        RESPONSE_SHAPE
            .replace("<risk level>", analysis.risk_level.as_str())
            .replace("<true|false>", if analysis.emergency_alert { "true" } else { "false" })
    );
    prompt
}
