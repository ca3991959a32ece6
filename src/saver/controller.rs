use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    generator::ReadingSource,
    loop_worker::{saver_loop, PassSummary, SaverDeps},
    SaverConfig, VitalsStore,
};
use crate::clock::Clock;

const MAX_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaverStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub last_pass: Option<PassSummary>,
    pub next_run: Option<DateTime<Utc>>,
}

/// Starts and stops the periodic vitals saver.
pub struct SaverController {
    store: Arc<dyn VitalsStore>,
    source: Arc<dyn ReadingSource>,
    clock: Arc<dyn Clock>,
    config: SaverConfig,
    last_pass: Arc<Mutex<Option<PassSummary>>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SaverController {
    pub fn new(
        store: Arc<dyn VitalsStore>,
        source: Arc<dyn ReadingSource>,
        clock: Arc<dyn Clock>,
        config: SaverConfig,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            config,
            last_pass: Arc::new(Mutex::new(None)),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("vitals saver already running");
        }

        info!(
            "Starting vitals saver, one reading per active patient every {}s",
            self.config.interval_secs
        );

        let cancel_token = CancellationToken::new();
        let deps = SaverDeps {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            clock: Arc::clone(&self.clock),
        };
        let handle = tokio::spawn(saver_loop(
            deps,
            self.config.clone(),
            Arc::clone(&self.last_pass),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("vitals saver task failed to join")?;
            self.store
                .flush()
                .await
                .context("failed to flush vitals store")?;
            info!("Vitals saver stopped");
        }
        Ok(())
    }

    pub fn status(&self) -> SaverStatus {
        let last_pass = match self.last_pass.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let running = self.is_running();
        let interval = Duration::seconds(self.config.interval_secs.min(MAX_INTERVAL_SECS) as i64);

        let next_run = if running {
            Some(match last_pass {
                Some(pass) => pass.at + interval,
                None => self.clock.now(),
            })
        } else {
            None
        };

        SaverStatus {
            running,
            interval_secs: self.config.interval_secs,
            last_pass,
            next_run,
        }
    }
}
