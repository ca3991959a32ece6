use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::analysis::{alert_level, is_normal};
use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_u32},
    models::{Reading, StoredReading},
};

const READING_COLUMNS: &str =
    "id, patient_id, timestamp, heart_rate, oxygen_level, temperature, device_id";

fn row_to_reading(row: &Row) -> Result<Reading> {
    let timestamp: String = row.get("timestamp")?;
    let heart_rate: i64 = row.get("heart_rate")?;
    let oxygen_level: i64 = row.get("oxygen_level")?;

    Ok(Reading {
        id: row.get("id")?,
        patient_id: row.get("patient_id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        heart_rate: to_u32(heart_rate, "heart_rate")?,
        oxygen_level: to_u32(oxygen_level, "oxygen_level")?,
        temperature: row.get("temperature")?,
        device_id: row.get("device_id")?,
    })
}

/// Derived columns are computed here so every write path agrees on them.
fn insert_reading_row(conn: &Connection, reading: &Reading) -> Result<StoredReading> {
    let level = alert_level(reading);
    let normal = is_normal(reading);

    conn.execute(
        "INSERT INTO readings (
            patient_id,
            timestamp,
            heart_rate,
            oxygen_level,
            temperature,
            device_id,
            alert_level,
            is_normal
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            reading.patient_id,
            format_datetime(&reading.timestamp),
            reading.heart_rate,
            reading.oxygen_level,
            reading.temperature,
            reading.device_id,
            level.as_str(),
            normal,
        ],
    )
    .with_context(|| format!("failed to insert reading for patient {}", reading.patient_id))?;

    Ok(StoredReading {
        id: conn.last_insert_rowid(),
        alert_level: level,
        is_normal: normal,
    })
}

impl Database {
    pub async fn insert_reading(&self, reading: &Reading) -> Result<StoredReading> {
        let record = reading.clone();
        self.execute(move |conn| insert_reading_row(conn, &record))
            .await
    }

    /// All-or-nothing bulk insert.
    pub async fn insert_readings(&self, readings: Vec<Reading>) -> Result<Vec<StoredReading>> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut stored = Vec::with_capacity(readings.len());
            for reading in &readings {
                stored.push(insert_reading_row(&tx, reading)?);
            }
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    /// Readings with `start <= timestamp <= end`, newest first.
    pub async fn readings_in_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {READING_COLUMNS}
                 FROM readings
                 WHERE patient_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
                 ORDER BY timestamp DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![
                patient_id,
                format_datetime(&start),
                format_datetime(&end)
            ])?;

            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }
            Ok(readings)
        })
        .await
    }

    pub async fn latest_reading(&self, patient_id: &str) -> Result<Option<Reading>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {READING_COLUMNS}
                 FROM readings
                 WHERE patient_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![patient_id])?;
            let reading = match rows.next()? {
                Some(row) => Some(row_to_reading(row)?),
                None => None,
            };
            Ok(reading)
        })
        .await
    }
}
