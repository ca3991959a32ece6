//! Emergency contact data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person to notify when a patient's vitals escalate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    pub phone: String,
    pub relationship: String,
    /// Primary contacts are notified first.
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}
