use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use uuid::Uuid;

use super::{
    message::{compose_message, maps_link},
    AlertSink, ContactNotification, ContactResolver, EmergencyAlert, EscalationConfig,
    EscalationOutcome, Location, NotSentReason, PatientDirectory,
};
use crate::analysis::{AnalysisResult, Severity};
use crate::clock::Clock;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub struct EscalationDispatcher {
    directory: Arc<dyn PatientDirectory>,
    contacts: Arc<dyn ContactResolver>,
    clock: Arc<dyn Clock>,
    config: EscalationConfig,
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl EscalationDispatcher {
    pub fn new(
        directory: Arc<dyn PatientDirectory>,
        contacts: Arc<dyn ContactResolver>,
        clock: Arc<dyn Clock>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            directory,
            contacts,
            clock,
            config,
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    async fn bounded<T>(&self, what: &str, lookup: impl Future<Output = Result<T>>) -> Result<T, String> {
        let limit = Duration::from_secs(self.config.contact_timeout_secs);
        match tokio::time::timeout(limit, lookup).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(format!("{what} failed: {err:#}")),
            Err(_) => Err(format!(
                "{what} timed out after {}s",
                self.config.contact_timeout_secs
            )),
        }
    }

    /// Never fails; every fault ends in a terminal outcome.
    pub async fn escalate(
        &self,
        patient_id: &str,
        analysis: &AnalysisResult,
        location: Option<Location>,
    ) -> EscalationOutcome {
        if !analysis.emergency_alert {
            return EscalationOutcome::NotSent {
                reason: NotSentReason::BelowThreshold,
                at: self.clock.now(),
            };
        }

        let names: Vec<&str> = analysis
            .detected_diseases
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        log_info!(
            "Emergency escalation for patient {patient_id}: risk {}, conditions [{}]",
            analysis.risk_level,
            names.join(", ")
        );

        // Step 1: patient
        let patient = match self
            .bounded("patient lookup", self.directory.find_patient(patient_id))
            .await
        {
            Ok(Some(patient)) => patient,
            Ok(None) => {
                log_warn!("Escalation skipped: patient {patient_id} not found");
                return EscalationOutcome::NotSent {
                    reason: NotSentReason::NotFound,
                    at: self.clock.now(),
                };
            }
            Err(message) => {
                log_warn!("Escalation for {patient_id} aborted: {message}");
                return EscalationOutcome::Error {
                    message,
                    at: self.clock.now(),
                };
            }
        };

        // Step 2: contacts, primary first
        let mut contacts = match self
            .bounded("contact lookup", self.contacts.contacts_for(patient_id))
            .await
        {
            Ok(contacts) => contacts,
            Err(message) => {
                log_warn!("Escalation for {patient_id} aborted: {message}");
                return EscalationOutcome::Error {
                    message,
                    at: self.clock.now(),
                };
            }
        };
        if contacts.is_empty() {
            log_warn!("Escalation skipped: no emergency contacts for {patient_id}");
            return EscalationOutcome::NotSent {
                reason: NotSentReason::NoContacts,
                at: self.clock.now(),
            };
        }
        contacts.sort_by_key(|contact| !contact.is_primary);

        // Step 3: payload
        let sent_at = self.clock.now();
        let diseases: Vec<_> = analysis
            .detected_diseases
            .iter()
            .filter(|d| matches!(d.severity, Severity::Critical | Severity::High))
            .cloned()
            .collect();
        let link = location.as_ref().and_then(maps_link);
        let message = compose_message(
            &patient.name,
            sent_at,
            analysis.risk_level,
            &diseases,
            link.as_deref(),
        );

        let contacts_notified: Vec<ContactNotification> = contacts
            .into_iter()
            .map(|contact| ContactNotification {
                name: contact.name,
                phone: contact.phone,
                relationship: contact.relationship,
                is_primary: contact.is_primary,
                alert_sent: true,
                timestamp: sent_at,
            })
            .collect();

        let alert = EmergencyAlert {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            patient_name: patient.name,
            risk_level: analysis.risk_level,
            diseases,
            location,
            maps_link: link,
            total_contacts_notified: contacts_notified.len(),
            contacts_notified,
            message,
            sent_at,
        };

        log_info!(
            "Emergency alert {} prepared for {} contact(s)",
            alert.id,
            alert.total_contacts_notified
        );

        for sink in &self.sinks {
            if let Err(err) = sink.deliver(&alert).await {
                log_warn!("Alert sink {} failed for {}: {err:#}", sink.name(), alert.id);
            }
        }

        EscalationOutcome::Sent(alert)
    }
}

/// Writes finished alerts to the log.
pub struct LogAlertSink;

#[async_trait::async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, alert: &EmergencyAlert) -> Result<()> {
        log::warn!(
            "EMERGENCY {} for patient {} ({} contact(s))\n{}",
            alert.id,
            alert.patient_id,
            alert.total_contacts_notified,
            alert.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_readings, AnalysisConfig, RiskLevel};
    use crate::clock::FixedClock;
    use crate::db::models::{EmergencyContact, Patient, PatientStatus, Reading};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct Directory(Option<Patient>);

    #[async_trait]
    impl PatientDirectory for Directory {
        async fn find_patient(&self, _patient_id: &str) -> Result<Option<Patient>> {
            Ok(self.0.clone())
        }
    }

    enum Contacts {
        List(Vec<EmergencyContact>),
        Fails,
        Hangs,
    }

    #[async_trait]
    impl ContactResolver for Contacts {
        async fn contacts_for(&self, _patient_id: &str) -> Result<Vec<EmergencyContact>> {
            match self {
                Contacts::List(list) => Ok(list.clone()),
                Contacts::Fails => Err(anyhow!("contact store offline")),
                Contacts::Hangs => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Uuid>>);

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, alert: &EmergencyAlert) -> Result<()> {
            self.0.lock().unwrap().push(alert.id);
            Ok(())
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn patient() -> Patient {
        Patient {
            id: "p-1".into(),
            name: "Ada".into(),
            status: PatientStatus::Active,
            alerts: 0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn contact(name: &str, is_primary: bool) -> EmergencyContact {
        EmergencyContact {
            id: name.into(),
            patient_id: "p-1".into(),
            name: name.into(),
            phone: "555-0100".into(),
            relationship: "Friend".into(),
            is_primary,
            created_at: now(),
        }
    }

    fn emergency_analysis() -> AnalysisResult {
        let readings = (0..10)
            .map(|i| Reading {
                id: None,
                patient_id: "p-1".into(),
                timestamp: now() - chrono::Duration::minutes(i),
                heart_rate: if i < 2 { 260 } else { 75 },
                oxygen_level: 98,
                temperature: if i < 4 { 100.8 } else { 98.6 },
                device_id: None,
            })
            .collect();
        analyze_readings(readings, &AnalysisConfig::default()).unwrap()
    }

    fn dispatcher(directory: Directory, contacts: Contacts) -> EscalationDispatcher {
        EscalationDispatcher::new(
            Arc::new(directory),
            Arc::new(contacts),
            Arc::new(FixedClock::new(now())),
            EscalationConfig::default(),
        )
    }

    #[tokio::test]
    async fn sends_to_primary_contacts_first() {
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = dispatcher(
            Directory(Some(patient())),
            Contacts::List(vec![
                contact("Bo", false),
                contact("Cy", true),
                contact("Di", false),
            ]),
        );
        dispatcher.add_sink(sink.clone());

        let analysis = emergency_analysis();
        let outcome = dispatcher
            .escalate(
                "p-1",
                &analysis,
                Some(Location {
                    latitude: 1.5,
                    longitude: 2.25,
                }),
            )
            .await;

        let alert = outcome.alert().expect("alert sent");
        let order: Vec<&str> = alert
            .contacts_notified
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(order, vec!["Cy", "Bo", "Di"]);
        assert!(alert.contacts_notified.iter().all(|c| c.alert_sent));
        assert_eq!(alert.total_contacts_notified, 3);
        assert_eq!(alert.risk_level, RiskLevel::Critical);
        assert_eq!(alert.sent_at, now());
        assert_eq!(
            alert.maps_link.as_deref(),
            Some("https://maps.google.com/?q=1.5,2.25")
        );
        // Persistent Fever is MODERATE and stays out of the alert
        assert_eq!(analysis.detected_diseases.len(), 2);
        assert_eq!(alert.diseases.len(), 1);
        assert_eq!(alert.diseases[0].name, "Atrial Fibrillation");
        assert_eq!(sink.0.lock().unwrap().as_slice(), &[alert.id]);
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let dispatcher = dispatcher(Directory(None), Contacts::List(vec![contact("Bo", true)]));
        let outcome = dispatcher.escalate("p-1", &emergency_analysis(), None).await;

        assert!(matches!(
            outcome,
            EscalationOutcome::NotSent {
                reason: NotSentReason::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn no_contacts_is_not_sent() {
        let dispatcher = dispatcher(Directory(Some(patient())), Contacts::List(Vec::new()));
        let outcome = dispatcher.escalate("p-1", &emergency_analysis(), None).await;

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["alertSent"], false);
        assert_eq!(json["reason"], "no_contacts");
    }

    #[tokio::test]
    async fn resolver_fault_becomes_error_outcome() {
        let dispatcher = dispatcher(Directory(Some(patient())), Contacts::Fails);
        let outcome = dispatcher.escalate("p-1", &emergency_analysis(), None).await;

        match outcome {
            EscalationOutcome::Error { message, .. } => {
                assert!(message.contains("contact store offline"))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_contact_lookup_times_out() {
        let dispatcher = dispatcher(Directory(Some(patient())), Contacts::Hangs);
        let outcome = dispatcher.escalate("p-1", &emergency_analysis(), None).await;

        match outcome {
            EscalationOutcome::Error { message, .. } => assert!(message.contains("timed out")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_emergency_is_below_threshold() {
        let mut analysis = emergency_analysis();
        analysis.emergency_alert = false;
        let dispatcher = dispatcher(Directory(Some(patient())), Contacts::List(Vec::new()));

        let outcome = dispatcher.escalate("p-1", &analysis, None).await;
        assert!(matches!(
            outcome,
            EscalationOutcome::NotSent {
                reason: NotSentReason::BelowThreshold,
                ..
            }
        ));
    }
}
