use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::report::{AnalysisReport, ImportSummary, QUICK_NOTE};
use crate::advisory::{build_prompt, fallback_advice, request_advice, AdvisoryGenerator, AdvisoryReport};
use crate::analysis::{
    analyze_window, sanitize_batch, sanitize_reading, screen_window, AlertLevel, AnalysisConfig,
    AnalysisError, AnalysisResult, ExclusionSummary, RawReading, Rejection, Stage, Window,
};
use crate::clock::Clock;
use crate::db::models::{Reading, StoredReading};
use crate::db::Database;
use crate::escalation::{EscalationDispatcher, Location};
use crate::saver::VitalsStore;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Supplies a patient's readings for a time range.
#[async_trait]
pub trait WindowSupplier: Send + Sync {
    async fn fetch_window(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>>;
}

#[async_trait]
impl WindowSupplier for Database {
    async fn fetch_window(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        self.readings_in_range(patient_id, start, end).await
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("reading rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("failed to store reading: {0:#}")]
    Store(#[source] anyhow::Error),
}

struct PipelineRun {
    analysis: AnalysisResult,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    excluded: ExclusionSummary,
}

/// Ties the analysis pipeline to its collaborators.
pub struct VitalsMonitor {
    windows: Arc<dyn WindowSupplier>,
    store: Arc<dyn VitalsStore>,
    dispatcher: EscalationDispatcher,
    clock: Arc<dyn Clock>,
    config: AnalysisConfig,
    advisory: Option<Arc<dyn AdvisoryGenerator>>,
    advisory_timeout: Duration,
}

impl VitalsMonitor {
    pub fn new(
        windows: Arc<dyn WindowSupplier>,
        store: Arc<dyn VitalsStore>,
        dispatcher: EscalationDispatcher,
        clock: Arc<dyn Clock>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            windows,
            store,
            dispatcher,
            clock,
            config,
            advisory: None,
            advisory_timeout: Duration::from_secs(90),
        }
    }

    pub fn with_advisory(mut self, generator: Arc<dyn AdvisoryGenerator>, timeout: Duration) -> Self {
        self.advisory = Some(generator);
        self.advisory_timeout = timeout;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    async fn run_pipeline(&self, patient_id: &str) -> Result<PipelineRun, AnalysisError> {
        let end = self.clock.now();
        let start = end - chrono::Duration::days(i64::from(self.config.window_days));

        let fetched = self
            .windows
            .fetch_window(patient_id, start, end)
            .await
            .map_err(|err| AnalysisError::stage(patient_id, Stage::FetchWindow, err))?;
        let (readings, excluded) = screen_window(fetched, &self.config.bounds);
        if excluded.total() > 0 {
            log_warn!(
                "Excluded {} implausible reading(s) from {patient_id}'s window",
                excluded.total()
            );
        }
        let window = Window::new(readings)?;

        let config = self.config.clone();
        let analysis = tokio::task::spawn_blocking(move || analyze_window(&window, &config))
            .await
            .map_err(|err| {
                AnalysisError::stage(patient_id, Stage::Aggregate, anyhow!("analysis task failed: {err}"))
            })?;

        Ok(PipelineRun {
            analysis,
            start,
            end,
            excluded,
        })
    }

    /// Analysis only; no escalation and no advisory call.
    pub async fn quick_analyze(&self, patient_id: &str) -> Result<AnalysisReport, AnalysisError> {
        let run = self.run_pipeline(patient_id).await?;

        Ok(AnalysisReport {
            patient_id: patient_id.to_string(),
            analysis_date: run.end,
            window_start: run.start,
            window_end: run.end,
            breakdown: run.analysis.breakdown(),
            analysis: run.analysis,
            excluded: run.excluded,
            escalation: None,
            advice: None,
            ai_timeout: false,
            patient_location: None,
            note: Some(QUICK_NOTE.to_string()),
        })
    }

    /// Full analysis: escalates on emergency, then asks for advice.
    pub async fn analyze(
        &self,
        patient_id: &str,
        location: Option<Location>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let PipelineRun {
            analysis,
            start,
            end,
            excluded,
        } = self.run_pipeline(patient_id).await?;
        let breakdown = analysis.breakdown();

        log_info!(
            "Analysis for {patient_id}: {} readings, risk {}, {} condition(s)",
            analysis.total_readings,
            analysis.risk_level,
            analysis.detected_diseases.len()
        );

        let escalation = if analysis.emergency_alert {
            Some(self.dispatcher.escalate(patient_id, &analysis, location).await)
        } else {
            None
        };

        let report = match &self.advisory {
            Some(generator) => {
                let prompt = build_prompt(patient_id, &analysis, &breakdown);
                request_advice(generator.as_ref(), prompt, &analysis, self.advisory_timeout).await
            }
            None => AdvisoryReport {
                advice: fallback_advice(&analysis),
                ai_timeout: true,
            },
        };

        Ok(AnalysisReport {
            patient_id: patient_id.to_string(),
            analysis_date: end,
            window_start: start,
            window_end: end,
            analysis,
            breakdown,
            excluded,
            escalation,
            advice: Some(report.advice),
            ai_timeout: report.ai_timeout,
            patient_location: location,
            note: None,
        })
    }

    async fn bump_alert(&self, patient_id: &str) {
        if let Err(err) = self.store.record_alert(patient_id).await {
            log_warn!("Failed to bump alert counter for {patient_id}: {err:#}");
        }
    }

    /// Sanitise and persist one raw reading.
    pub async fn record_reading(
        &self,
        patient_id: &str,
        raw: &RawReading,
    ) -> Result<StoredReading, RecordError> {
        let reading = sanitize_reading(patient_id, raw, &self.config.bounds)?;
        let stored = self
            .store
            .save_reading(&reading)
            .await
            .map_err(RecordError::Store)?;
        if stored.alert_level != AlertLevel::Normal {
            self.bump_alert(patient_id).await;
        }
        Ok(stored)
    }

    /// Sanitise a batch and store the valid readings in one transaction; the rest are counted.
    pub async fn record_readings(
        &self,
        patient_id: &str,
        raw: &[RawReading],
    ) -> Result<ImportSummary, RecordError> {
        let (readings, excluded) = sanitize_batch(patient_id, raw, &self.config.bounds);
        if excluded.total() > 0 {
            log_warn!(
                "Excluded {} reading(s) for {patient_id}: {} missing fields, {} out of range",
                excluded.total(),
                excluded.missing_fields,
                excluded.out_of_range
            );
        }

        let stored = if readings.is_empty() {
            Vec::new()
        } else {
            self.store
                .save_readings(&readings)
                .await
                .map_err(RecordError::Store)?
        };

        // counters move only after the batch is committed
        let mut alerts = 0;
        for row in &stored {
            if row.alert_level != AlertLevel::Normal {
                alerts += 1;
                self.bump_alert(patient_id).await;
            }
        }

        Ok(ImportSummary {
            stored: stored.len() as u64,
            alerts,
            excluded,
        })
    }
}
