use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::EmergencyContact,
};

fn row_to_contact(row: &Row) -> Result<EmergencyContact> {
    let created_at: String = row.get("created_at")?;

    Ok(EmergencyContact {
        id: row.get("id")?,
        patient_id: row.get("patient_id")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        relationship: row.get("relationship")?,
        is_primary: row.get("is_primary")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

/// Fields supplied when registering a contact.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
    pub is_primary: bool,
}

impl Database {
    pub async fn insert_contact(
        &self,
        patient_id: &str,
        contact: NewContact,
    ) -> Result<EmergencyContact> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let record = EmergencyContact {
                id: Uuid::new_v4().to_string(),
                patient_id,
                name: contact.name,
                phone: contact.phone,
                relationship: contact.relationship,
                is_primary: contact.is_primary,
                created_at: Utc::now(),
            };

            conn.execute(
                "INSERT INTO emergency_contacts
                    (id, patient_id, name, phone, relationship, is_primary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.patient_id,
                    record.name,
                    record.phone,
                    record.relationship,
                    record.is_primary,
                    format_datetime(&record.created_at),
                ],
            )?;
            Ok(record)
        })
        .await
    }

    /// Primary contacts first, then newest first.
    pub async fn list_contacts(&self, patient_id: &str) -> Result<Vec<EmergencyContact>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, patient_id, name, phone, relationship, is_primary, created_at
                 FROM emergency_contacts
                 WHERE patient_id = ?1
                 ORDER BY is_primary DESC, created_at DESC",
            )?;
            let mut rows = stmt.query(params![patient_id])?;

            let mut contacts = Vec::new();
            while let Some(row) = rows.next()? {
                contacts.push(row_to_contact(row)?);
            }
            Ok(contacts)
        })
        .await
    }
}
