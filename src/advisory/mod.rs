//! Optional free-text recommendations on top of an analysis.
//!
//! The generator is never trusted to answer: every call is bounded by a
//! timeout and falls back to a deterministic summary built from the analysis.

pub mod client;
pub mod fallback;
pub mod prompt;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, RiskLevel};
use crate::log_warn;

pub use client::HttpAdvisoryGenerator;
pub use fallback::fallback_advice;
pub use prompt::build_prompt;

const ENABLE_LOGS: bool = true;

#[async_trait]
pub trait AdvisoryGenerator: Send + Sync {
    async fn generate(&self, prompt: String) -> Result<String>;
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Advice {
    pub risk_assessment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_disease_risk: Option<String>,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_alert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// The generator answered with prose instead of JSON.
    #[serde(skip_serializing_if = "is_false")]
    pub raw_response: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ai_timeout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryReport {
    pub advice: Advice,
    pub ai_timeout: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdvisoryConfig {
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token, if any.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434/v1".into(),
            model: "llama3.2".into(),
            api_key_env: "VITALWATCH_ADVISORY_API_KEY".into(),
            timeout_secs: 90,
        }
    }
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (open < close).then(|| &text[open..=close])
}

/// Accepts a fenced JSON block or the outermost object; anything else is kept as raw text.
pub fn parse_advice(text: &str, risk_level: RiskLevel) -> Advice {
    let parsed = extract_json(text).and_then(|json| serde_json::from_str::<Advice>(json).ok());

    match parsed {
        Some(mut advice) => {
            if advice.risk_assessment.is_empty() {
                advice.risk_assessment = risk_level.as_str().to_string();
            }
            advice
        }
        None => Advice {
            risk_assessment: risk_level.as_str().to_string(),
            summary: Some(text.to_string()),
            raw_response: true,
            ..Advice::default()
        },
    }
}

/// Ask the generator, falling back on error or timeout.
pub async fn request_advice(
    generator: &dyn AdvisoryGenerator,
    prompt: String,
    analysis: &AnalysisResult,
    timeout: Duration,
) -> AdvisoryReport {
    match tokio::time::timeout(timeout, generator.generate(prompt)).await {
        Ok(Ok(text)) => AdvisoryReport {
            advice: parse_advice(&text, analysis.risk_level),
            ai_timeout: false,
        },
        Ok(Err(err)) => {
            log_warn!("Advisory generation failed: {err:#}");
            AdvisoryReport {
                advice: fallback_advice(analysis),
                ai_timeout: true,
            }
        }
        Err(_) => {
            log_warn!("Advisory generation timed out after {}s", timeout.as_secs());
            AdvisoryReport {
                advice: fallback_advice(analysis),
                ai_timeout: true,
            }
        }
    }
}
