//! Periodic vitals saver: stores one fresh reading per active patient on a fixed interval.

pub mod controller;
pub mod generator;
pub mod loop_worker;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::models::{Patient, Reading, StoredReading};
use crate::db::Database;

pub use controller::{SaverController, SaverStatus};
pub use generator::{ReadingSource, SimulatedVitals};
pub use loop_worker::PassSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaverConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Bound on a single pass over all patients.
    pub pass_timeout_secs: u64,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            pass_timeout_secs: 120,
        }
    }
}

/// Store operations the saver needs.
#[async_trait]
pub trait VitalsStore: Send + Sync {
    async fn active_patients(&self) -> Result<Vec<Patient>>;

    async fn save_reading(&self, reading: &Reading) -> Result<StoredReading>;

    /// Persists the whole batch or nothing.
    async fn save_readings(&self, readings: &[Reading]) -> Result<Vec<StoredReading>>;

    async fn record_alert(&self, patient_id: &str) -> Result<()>;

    /// Makes prior writes durable; called when the saver stops.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl VitalsStore for Database {
    async fn active_patients(&self) -> Result<Vec<Patient>> {
        self.list_active_patients().await
    }

    async fn save_reading(&self, reading: &Reading) -> Result<StoredReading> {
        self.insert_reading(reading).await
    }

    async fn save_readings(&self, readings: &[Reading]) -> Result<Vec<StoredReading>> {
        self.insert_readings(readings.to_vec()).await
    }

    async fn record_alert(&self, patient_id: &str) -> Result<()> {
        self.increment_patient_alerts(patient_id).await.map(|_| ())
    }

    async fn flush(&self) -> Result<()> {
        self.checkpoint().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{alert_level, is_normal};
    use crate::clock::FixedClock;
    use crate::db::models::PatientStatus;
    use anyhow::bail;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryStore {
        patients: Vec<Patient>,
        broken: Vec<String>,
        readings: Mutex<Vec<Reading>>,
        alerts: Mutex<HashMap<String, u64>>,
        flushes: Mutex<u32>,
    }

    #[async_trait]
    impl VitalsStore for MemoryStore {
        async fn active_patients(&self) -> Result<Vec<Patient>> {
            Ok(self.patients.clone())
        }

        async fn save_reading(&self, reading: &Reading) -> Result<StoredReading> {
            if self.broken.contains(&reading.patient_id) {
                bail!("disk full");
            }
            let mut readings = self.readings.lock().unwrap();
            readings.push(reading.clone());
            Ok(StoredReading {
                id: readings.len() as i64,
                alert_level: alert_level(reading),
                is_normal: is_normal(reading),
            })
        }

        async fn save_readings(&self, batch: &[Reading]) -> Result<Vec<StoredReading>> {
            let mut stored = Vec::with_capacity(batch.len());
            for reading in batch {
                stored.push(self.save_reading(reading).await?);
            }
            Ok(stored)
        }

        async fn flush(&self) -> Result<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }

        async fn record_alert(&self, patient_id: &str) -> Result<()> {
            *self
                .alerts
                .lock()
                .unwrap()
                .entry(patient_id.to_string())
                .or_default() += 1;
            Ok(())
        }
    }

    /// Patients whose id starts with "sick" always read a racing pulse.
    struct FixedSource;

    impl ReadingSource for FixedSource {
        fn next_reading(&self, patient: &Patient, at: DateTime<Utc>) -> Reading {
            Reading {
                id: None,
                patient_id: patient.id.clone(),
                timestamp: at,
                heart_rate: if patient.id.starts_with("sick") { 130 } else { 72 },
                oxygen_level: 98,
                temperature: 98.4,
                device_id: None,
            }
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
    }

    fn patient(id: &str) -> Patient {
        Patient {
            id: id.into(),
            name: id.into(),
            status: PatientStatus::Active,
            alerts: 0,
            created_at: start(),
            updated_at: start(),
        }
    }

    fn controller(store: Arc<MemoryStore>) -> SaverController {
        SaverController::new(
            store,
            Arc::new(FixedSource),
            Arc::new(FixedClock::new(start())),
            SaverConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let store = Arc::new(MemoryStore {
            patients: vec![patient("calm"), patient("sick-1")],
            ..MemoryStore::default()
        });
        let mut saver = controller(Arc::clone(&store));

        saver.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.readings.lock().unwrap().len(), 2);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.readings.lock().unwrap().len(), 4);

        saver.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(store.readings.lock().unwrap().len(), 4);

        let alerts = store.alerts.lock().unwrap();
        assert_eq!(alerts.get("sick-1"), Some(&2));
        assert_eq!(alerts.get("calm"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_patient_does_not_stop_the_pass() {
        let store = Arc::new(MemoryStore {
            patients: vec![patient("a"), patient("broken"), patient("b")],
            broken: vec!["broken".into()],
            ..MemoryStore::default()
        });
        let mut saver = controller(Arc::clone(&store));

        saver.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let status = saver.status();
        let pass = status.last_pass.expect("first pass recorded");
        assert_eq!(pass.saved, 2);
        assert_eq!(pass.failed, 1);
        assert!(status.running);
        assert_eq!(status.next_run, Some(start() + chrono::Duration::seconds(300)));

        saver.stop().await.unwrap();
        assert!(!saver.status().running);
        assert!(saver.status().next_run.is_none());
    }

    #[tokio::test]
    async fn stopping_flushes_the_store_once() {
        let store = Arc::new(MemoryStore::default());
        let mut saver = controller(Arc::clone(&store));

        saver.stop().await.unwrap();
        assert_eq!(*store.flushes.lock().unwrap(), 0);

        saver.start().unwrap();
        saver.stop().await.unwrap();
        assert_eq!(*store.flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut saver = controller(Arc::new(MemoryStore::default()));
        saver.start().unwrap();
        assert!(saver.start().is_err());
        saver.stop().await.unwrap();
        saver.start().unwrap();
        saver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn database_store_counts_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("vitals.sqlite3")).unwrap();
        db.upsert_patient("sick-7", "Bo", PatientStatus::Active)
            .await
            .unwrap();

        let deps = loop_worker::SaverDeps {
            store: Arc::new(db.clone()),
            source: Arc::new(FixedSource),
            clock: Arc::new(FixedClock::new(start())),
        };
        let summary = loop_worker::save_pass(&deps).await.unwrap();

        assert_eq!(summary.saved, 1);
        assert_eq!(summary.alerts, 1);
        let patient = db.get_patient("sick-7").await.unwrap().unwrap();
        assert_eq!(patient.alerts, 1);
        assert_eq!(db.latest_reading("sick-7").await.unwrap().unwrap().heart_rate, 130);
    }
}
