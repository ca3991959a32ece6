pub mod advisory;
pub mod analysis;
pub mod cli;
pub mod clock;
pub mod db;
pub mod escalation;
pub mod monitor;
pub mod saver;
pub mod settings;
mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use log::info;

use advisory::HttpAdvisoryGenerator;
use cli::{Cli, Commands, SettingsAction};
use clock::{Clock, SystemClock};
use db::{Database, PatientStatus};
use db::repositories::NewContact;
use escalation::{dispatcher::LogAlertSink, EscalationDispatcher, Location};
use monitor::VitalsMonitor;
use saver::{SaverController, SimulatedVitals};
use settings::{SettingsStore, SETTINGS_FILE};

pub const DATA_DIR_ENV: &str = "VITALWATCH_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "vitalwatch-data";
const DB_FILE: &str = "vitalwatch.sqlite3";

/// Data directory from the CLI flag, then the environment, then the default.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Long-lived handles shared by every command.
pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub monitor: VitalsMonitor,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DB_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut dispatcher = EscalationDispatcher::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::clone(&clock),
            settings.escalation(),
        );
        dispatcher.add_sink(Arc::new(LogAlertSink));

        let mut monitor = VitalsMonitor::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            dispatcher,
            Arc::clone(&clock),
            settings.analysis(),
        );

        let advice = settings.advisory();
        if advice.enabled {
            info!("Advisory enabled via {} ({})", advice.endpoint, advice.model);
            monitor = monitor.with_advisory(
                Arc::new(HttpAdvisoryGenerator::from_config(&advice)),
                Duration::from_secs(advice.timeout_secs),
            );
        }

        Ok(Self {
            db,
            settings,
            monitor,
            clock,
        })
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(state: &AppState) -> Result<()> {
    let config = state.settings.saver();
    if !config.enabled {
        info!("Vitals saver disabled in settings; nothing to run");
        return Ok(());
    }

    let mut saver = SaverController::new(
        Arc::new(state.db.clone()),
        Arc::new(SimulatedVitals::new()),
        Arc::clone(&state.clock),
        config,
    );
    saver.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    saver.stop().await
}

pub async fn run(cli: Cli) -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let data_dir = resolve_data_dir(cli.data_dir);
    info!("VitalWatch starting with data directory {}", data_dir.display());
    let state = AppState::open(&data_dir)?;

    match cli.command {
        Commands::Serve => serve(&state).await?,
        Commands::Analyze {
            patient_id,
            quick,
            latitude,
            longitude,
        } => {
            let location = match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(Location {
                    latitude,
                    longitude,
                }),
                _ => None,
            };
            let report = if quick {
                state.monitor.quick_analyze(&patient_id).await?
            } else {
                state.monitor.analyze(&patient_id, location).await?
            };
            print_json(&report)?;
        }
        Commands::AddPatient { id, name, inactive } => {
            let status = if inactive {
                PatientStatus::Inactive
            } else {
                PatientStatus::Active
            };
            print_json(&state.db.upsert_patient(&id, &name, status).await?)?;
        }
        Commands::AddContact {
            patient_id,
            name,
            phone,
            relationship,
            primary,
        } => {
            let contact = NewContact {
                name,
                phone,
                relationship,
                is_primary: primary,
            };
            print_json(&state.db.insert_contact(&patient_id, contact).await?)?;
        }
        Commands::Import { patient_id, file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let raw: Vec<analysis::RawReading> = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of readings", file.display()))?;
            print_json(&state.monitor.record_readings(&patient_id, &raw).await?)?;
        }
        Commands::Settings { action } => match action {
            None | Some(SettingsAction::Show) => print_json(&state.settings.snapshot())?,
            Some(SettingsAction::Set { key, value }) => {
                let updated = state.settings.set(&key, &value)?;
                info!("Updated {key} in {}", state.settings.path().display());
                print_json(&updated)?;
            }
        },
    }

    Ok(())
}
