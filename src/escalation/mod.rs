//! Emergency escalation: turning an emergency analysis into a notification payload.
//!
//! Delivery of the payload is delegated to [`AlertSink`]s; the dispatcher's
//! contract ends once the structured [`EmergencyAlert`] exists.

pub mod dispatcher;
pub mod message;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{DetectedCondition, RiskLevel};
use crate::db::models::{EmergencyContact, Patient};
use crate::db::Database;

pub use dispatcher::EscalationDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One prepared notification per contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactNotification {
    pub name: String,
    pub phone: String,
    pub relationship: String,
    pub is_primary: bool,
    pub alert_sent: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub patient_id: String,
    pub patient_name: String,
    pub risk_level: RiskLevel,
    /// CRITICAL and HIGH conditions only.
    pub diseases: Vec<DetectedCondition>,
    pub location: Option<Location>,
    pub maps_link: Option<String>,
    pub contacts_notified: Vec<ContactNotification>,
    pub total_contacts_notified: usize,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotSentReason {
    NotFound,
    NoContacts,
    BelowThreshold,
}

/// Terminal state of one escalation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    Sent(EmergencyAlert),
    NotSent {
        reason: NotSentReason,
        at: DateTime<Utc>,
    },
    Error {
        message: String,
        at: DateTime<Utc>,
    },
}

impl EscalationOutcome {
    pub fn alert_sent(&self) -> bool {
        matches!(self, EscalationOutcome::Sent(_))
    }

    pub fn alert(&self) -> Option<&EmergencyAlert> {
        match self {
            EscalationOutcome::Sent(alert) => Some(alert),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeWire<'a> {
    alert_sent: bool,
    #[serde(flatten)]
    alert: Option<&'a EmergencyAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<NotSentReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

impl Serialize for EscalationOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            EscalationOutcome::Sent(alert) => OutcomeWire {
                alert_sent: true,
                alert: Some(alert),
                reason: None,
                error: None,
                timestamp: alert.sent_at,
            },
            EscalationOutcome::NotSent { reason, at } => OutcomeWire {
                alert_sent: false,
                alert: None,
                reason: Some(*reason),
                error: None,
                timestamp: *at,
            },
            EscalationOutcome::Error { message, at } => OutcomeWire {
                alert_sent: false,
                alert: None,
                reason: None,
                error: Some(message.as_str()),
                timestamp: *at,
            },
        };
        wire.serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EscalationConfig {
    /// Bound on each patient or contact lookup.
    pub contact_timeout_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            contact_timeout_secs: 10,
        }
    }
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient(&self, patient_id: &str) -> Result<Option<Patient>>;
}

#[async_trait]
pub trait ContactResolver: Send + Sync {
    async fn contacts_for(&self, patient_id: &str) -> Result<Vec<EmergencyContact>>;
}

/// Receives finished alerts for delivery. Failures are logged, never propagated.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &EmergencyAlert) -> Result<()>;
}

#[async_trait]
impl PatientDirectory for Database {
    async fn find_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        self.get_patient(patient_id).await
    }
}

#[async_trait]
impl ContactResolver for Database {
    async fn contacts_for(&self, patient_id: &str) -> Result<Vec<EmergencyContact>> {
        self.list_contacts(patient_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn not_sent_serializes_with_reason() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let outcome = EscalationOutcome::NotSent {
            reason: NotSentReason::NoContacts,
            at,
        };
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["alertSent"], false);
        assert_eq!(json["reason"], "no_contacts");
        assert!(json.get("error").is_none());
        assert!(json.get("patientId").is_none());
    }

    #[test]
    fn error_serializes_message() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let outcome = EscalationOutcome::Error {
            message: "directory offline".into(),
            at,
        };
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["alertSent"], false);
        assert_eq!(json["error"], "directory offline");
        assert!(!outcome.alert_sent());
    }
}
