use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vital-sign pattern detection and emergency escalation
#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(author, version, about = "Vital-sign pattern detection and emergency escalation")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory; overrides VITALWATCH_DATA_DIR
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the periodic vitals saver until Ctrl-C
    Serve,

    /// Analyze a patient's trailing window and print the report as JSON
    Analyze {
        patient_id: String,

        /// Skip escalation and advisory
        #[arg(long)]
        quick: bool,

        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,

        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,
    },

    /// Register or update a patient
    AddPatient {
        id: String,
        name: String,

        #[arg(long)]
        inactive: bool,
    },

    /// Register an emergency contact for a patient
    AddContact {
        patient_id: String,
        name: String,
        phone: String,
        relationship: String,

        #[arg(long)]
        primary: bool,
    },

    /// Import a JSON array of raw readings for a patient
    Import { patient_id: String, file: PathBuf },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the effective settings
    Show,

    /// Set one value by dotted path, e.g. `analysis.triggers.critical 8`
    Set { key: String, value: String },
}
