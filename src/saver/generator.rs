use std::sync::Mutex;

use chrono::{DateTime, Timelike, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::db::models::{Patient, Reading};

/// Produces the reading stored for a patient on each saver pass.
pub trait ReadingSource: Send + Sync {
    fn next_reading(&self, patient: &Patient, at: DateTime<Utc>) -> Reading;
}

/// Plausible resting vitals with a day/night rhythm.
pub struct SimulatedVitals {
    rng: Mutex<StdRng>,
    device_id: String,
}

impl SimulatedVitals {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            device_id: "simulated".into(),
        }
    }
}

impl Default for SimulatedVitals {
    fn default() -> Self {
        Self::new()
    }
}

fn heart_rate_base(hour: u32) -> f64 {
    if hour >= 22 || hour <= 6 {
        60.0
    } else if (10..=20).contains(&hour) {
        75.0
    } else {
        70.0
    }
}

fn temperature_base(hour: u32) -> f64 {
    if (4..=8).contains(&hour) {
        97.8
    } else {
        98.2
    }
}

impl ReadingSource for SimulatedVitals {
    fn next_reading(&self, patient: &Patient, at: DateTime<Utc>) -> Reading {
        let hour = at.hour();
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let heart_rate = (heart_rate_base(hour) + rng.gen_range(-10.0..10.0)).floor() as u32;
        let temperature =
            ((temperature_base(hour) + rng.gen_range(-0.5..0.5)) * 10.0).round() / 10.0;
        let oxygen_level = rng.gen_range(96..=99);

        Reading {
            id: None,
            patient_id: patient.id.clone(),
            timestamp: at,
            heart_rate,
            oxygen_level,
            temperature,
            device_id: Some(self.device_id.clone()),
        }
    }
}
