pub mod contact;
pub mod patient;
pub mod reading;

pub use contact::EmergencyContact;
pub use patient::{Patient, PatientStatus};
pub use reading::{Reading, StoredReading};
