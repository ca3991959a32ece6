use chrono::{DateTime, Utc};

use super::Location;
use crate::analysis::{DetectedCondition, RiskLevel};

pub fn maps_link(location: &Location) -> Option<String> {
    if !location.latitude.is_finite() || !location.longitude.is_finite() {
        return None;
    }
    Some(format!(
        "https://maps.google.com/?q={},{}",
        location.latitude, location.longitude
    ))
}

const FOOTER: &str = "This is an automated alert from the VitalWatch monitoring service";

pub fn compose_message(
    patient_name: &str,
    sent_at: DateTime<Utc>,
    risk_level: RiskLevel,
    diseases: &[DetectedCondition],
    maps_link: Option<&str>,
) -> String {
    let conditions: Vec<String> = diseases
        .iter()
        .map(|disease| format!("- {} - {}", disease.name, disease.description))
        .collect();
    let location = match maps_link {
        Some(link) => format!("Patient Location: {link}"),
        None => "Location: Not available".to_string(),
    };

    format!(
        "MEDICAL EMERGENCY ALERT\n\n\
         Patient: {patient_name}\n\
         Time: {time}\n\
         Risk Level: {risk_level}\n\n\
         CRITICAL CONDITIONS DETECTED:\n\
         {conditions}\n\n\
         {location}\n\n\
         IMMEDIATE ACTION REQUIRED\n\
         Please check on the patient immediately or contact emergency services.\n\n\
         ---\n\
         {footer}",
        time = sent_at.format("%Y-%m-%d %H:%M:%S UTC"),
        conditions = conditions.join("\n"),
        footer = FOOTER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Severity, Tier, VitalSign};
    use chrono::TimeZone;

    #[test]
    fn link_uses_raw_coordinates() {
        let link = maps_link(&Location {
            latitude: 40.7128,
            longitude: -74.006,
        });
        assert_eq!(
            link.as_deref(),
            Some("https://maps.google.com/?q=40.7128,-74.006")
        );
        assert!(maps_link(&Location {
            latitude: f64::NAN,
            longitude: 1.0
        })
        .is_none());
    }

    #[test]
    fn message_lists_conditions_and_location() {
        let disease = DetectedCondition {
            name: "Atrial Fibrillation".into(),
            severity: Severity::Critical,
            percentage: 6,
            affected_readings: 6,
            description: "Extremely rapid heart rate (250+ bpm) detected in 6% of readings".into(),
            tier: Tier::AtrialFibrillation,
            vital_sign: VitalSign::HeartRate,
        };
        let at = Utc.with_ymd_and_hms(2026, 7, 4, 18, 30, 0).unwrap();

        let message = compose_message("Ada", at, RiskLevel::Critical, &[disease], None);

        assert!(message.contains("Patient: Ada"));
        assert!(message.contains("Time: 2026-07-04 18:30:00 UTC"));
        assert!(message.contains("Risk Level: CRITICAL"));
        assert!(message.contains("- Atrial Fibrillation - Extremely rapid heart rate"));
        assert!(message.contains("Location: Not available"));
        assert!(message.ends_with(FOOTER));
    }

    #[test]
    fn message_sections_are_in_order() {
        let at = Utc.with_ymd_and_hms(2026, 7, 4, 18, 30, 0).unwrap();
        let link = "https://maps.google.com/?q=1,2";

        let message = compose_message("Ada", at, RiskLevel::High, &[], Some(link));
        let lines: Vec<&str> = message.lines().collect();

        assert_eq!(lines[0], "MEDICAL EMERGENCY ALERT");
        assert_eq!(lines[2], "Patient: Ada");
        assert!(message.contains("\n\nPatient Location: https://maps.google.com/?q=1,2\n\n"));
        assert_eq!(lines[lines.len() - 2], "---");
    }
}
