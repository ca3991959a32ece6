use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_patient_status, to_u64},
    models::{Patient, PatientStatus},
};

const PATIENT_COLUMNS: &str = "id, name, status, alerts, created_at, updated_at";

fn row_to_patient(row: &Row) -> Result<Patient> {
    let status: String = row.get("status")?;
    let alerts: i64 = row.get("alerts")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Patient {
        id: row.get("id")?,
        name: row.get("name")?,
        status: parse_patient_status(&status)?,
        alerts: to_u64(alerts, "alerts")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Insert a patient or update name and status of an existing one.
    /// The alert counter and creation time are kept on update.
    pub async fn upsert_patient(
        &self,
        patient_id: &str,
        name: &str,
        status: PatientStatus,
    ) -> Result<Patient> {
        let patient_id = patient_id.to_string();
        let name = name.to_string();
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO patients (id, name, status, alerts, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
                params![patient_id, name, status.as_str(), now],
            )?;

            let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![patient_id])?;
            match rows.next()? {
                Some(row) => row_to_patient(row),
                None => bail!("patient {patient_id} missing after upsert"),
            }
        })
        .await
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![patient_id])?;
            let patient = match rows.next()? {
                Some(row) => Some(row_to_patient(row)?),
                None => None,
            };
            Ok(patient)
        })
        .await
    }

    pub async fn list_active_patients(&self) -> Result<Vec<Patient>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {PATIENT_COLUMNS} FROM patients WHERE status = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![PatientStatus::Active.as_str()])?;

            let mut patients = Vec::new();
            while let Some(row) = rows.next()? {
                patients.push(row_to_patient(row)?);
            }
            Ok(patients)
        })
        .await
    }

    pub async fn increment_patient_alerts(&self, patient_id: &str) -> Result<u64> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE patients SET alerts = alerts + 1, updated_at = ?2 WHERE id = ?1",
                params![patient_id, format_datetime(&Utc::now())],
            )?;
            if changed == 0 {
                bail!("patient {patient_id} not found");
            }

            let alerts: i64 = conn.query_row(
                "SELECT alerts FROM patients WHERE id = ?1",
                params![patient_id],
                |row| row.get(0),
            )?;
            to_u64(alerts, "alerts")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_keeps_alert_counter() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("vitals.sqlite3")).unwrap();

        db.upsert_patient("p-1", "Ada", PatientStatus::Active)
            .await
            .unwrap();
        assert_eq!(db.increment_patient_alerts("p-1").await.unwrap(), 1);
        assert_eq!(db.increment_patient_alerts("p-1").await.unwrap(), 2);

        let renamed = db
            .upsert_patient("p-1", "Ada L.", PatientStatus::Active)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Ada L.");
        assert_eq!(renamed.alerts, 2);
    }

    #[tokio::test]
    async fn only_active_patients_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("vitals.sqlite3")).unwrap();

        db.upsert_patient("a", "Active One", PatientStatus::Active)
            .await
            .unwrap();
        db.upsert_patient("b", "Gone", PatientStatus::Inactive)
            .await
            .unwrap();

        let active = db.list_active_patients().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");

        assert!(db.get_patient("missing").await.unwrap().is_none());
        assert!(db.increment_patient_alerts("missing").await.is_err());
    }
}
