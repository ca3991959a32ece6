use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{generator::ReadingSource, SaverConfig, VitalsStore};
use crate::analysis::AlertLevel;
use crate::clock::Clock;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Outcome of one pass over the active patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub at: DateTime<Utc>,
    pub saved: u32,
    pub failed: u32,
    pub alerts: u32,
}

pub(crate) struct SaverDeps {
    pub store: Arc<dyn VitalsStore>,
    pub source: Arc<dyn ReadingSource>,
    pub clock: Arc<dyn Clock>,
}

pub(crate) async fn saver_loop(
    deps: SaverDeps,
    config: SaverConfig,
    last_pass: Arc<Mutex<Option<PassSummary>>>,
    cancel_token: CancellationToken,
) {
    // first tick completes immediately
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let pass_timeout = Duration::from_secs(config.pass_timeout_secs);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tokio::time::timeout(pass_timeout, save_pass(&deps)).await {
                    Ok(Ok(summary)) => {
                        if summary.saved + summary.failed > 0 {
                            log_info!(
                                "Saved vitals: {} success, {} errors, {} alerts",
                                summary.saved, summary.failed, summary.alerts
                            );
                        }
                        let mut guard = match last_pass.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        *guard = Some(summary);
                    }
                    Ok(Err(err)) => log_error!("vitals save pass failed: {err:?}"),
                    Err(_) => log_warn!("vitals save pass timeout (> {}s)", config.pass_timeout_secs),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("vitals saver shutting down");
                break;
            }
        }
    }
}

/// One reading per active patient. Per-patient failures are counted, not propagated.
pub(crate) async fn save_pass(deps: &SaverDeps) -> Result<PassSummary> {
    let at = deps.clock.now();
    let patients = deps
        .store
        .active_patients()
        .await
        .context("failed to list active patients")?;

    let mut summary = PassSummary {
        at,
        saved: 0,
        failed: 0,
        alerts: 0,
    };

    for patient in &patients {
        let reading = deps.source.next_reading(patient, at);
        let stored = match deps.store.save_reading(&reading).await {
            Ok(stored) => stored,
            Err(err) => {
                log_error!("Error saving vitals for patient {}: {err:#}", patient.id);
                summary.failed += 1;
                continue;
            }
        };
        summary.saved += 1;

        if stored.alert_level != AlertLevel::Normal {
            match deps.store.record_alert(&patient.id).await {
                Ok(()) => summary.alerts += 1,
                Err(err) => {
                    log_warn!("Failed to bump alert counter for {}: {err:#}", patient.id)
                }
            }
        }
    }

    Ok(summary)
}
