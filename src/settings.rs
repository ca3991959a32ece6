use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::advisory::AdvisoryConfig;
use crate::analysis::AnalysisConfig;
use crate::escalation::EscalationConfig;
use crate::saver::SaverConfig;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    pub analysis: AnalysisConfig,
    pub advisory: AdvisoryConfig,
    pub escalation: EscalationConfig,
    pub saver: SaverConfig,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    /// Missing file means defaults; an unreadable one is logged and replaced by defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring malformed settings at {}: {err}", path.display());
                    MonitorSettings::default()
                }
            }
        } else {
            MonitorSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, MonitorSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MonitorSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> MonitorSettings {
        self.read().clone()
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.read().analysis.clone()
    }

    pub fn advisory(&self) -> AdvisoryConfig {
        self.read().advisory.clone()
    }

    pub fn escalation(&self) -> EscalationConfig {
        self.read().escalation
    }

    pub fn saver(&self) -> SaverConfig {
        self.read().saver.clone()
    }

    /// Apply `change` and persist; the in-memory copy is only replaced when the write succeeds.
    pub fn update<F>(&self, change: F) -> Result<MonitorSettings>
    where
        F: FnOnce(&mut MonitorSettings),
    {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized)
            .with_context(|| format!("Failed to write settings to {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    /// Set one value by dotted camelCase path, e.g. `analysis.triggers.critical`.
    /// `raw` is parsed as JSON when it can be, otherwise taken as a string.
    pub fn set(&self, key: &str, raw: &str) -> Result<MonitorSettings> {
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));

        let mut tree = serde_json::to_value(self.snapshot())?;
        let mut slot = &mut tree;
        for part in key.split('.') {
            slot = slot
                .get_mut(part)
                .with_context(|| format!("unknown setting {key}"))?;
        }
        if slot.is_object() {
            bail!("{key} is a section; set one of its fields instead");
        }
        *slot = value;

        let next: MonitorSettings = serde_json::from_value(tree)
            .with_context(|| format!("invalid value {raw} for {key}"))?;
        self.update(|settings| *settings = next)
    }
}
