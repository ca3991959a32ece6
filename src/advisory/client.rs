use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{AdvisoryConfig, AdvisoryGenerator};

const SYSTEM_PROMPT: &str =
    "You review aggregated vital-sign statistics and answer with a single JSON object.";

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpAdvisoryGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpAdvisoryGenerator {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            api_key,
        }
    }

    /// Reads the API key from the configured environment variable, if set.
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(config.endpoint.clone(), config.model.clone(), api_key)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AdvisoryGenerator for HttpAdvisoryGenerator {
    async fn generate(&self, prompt: String) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.7,
            "max_tokens": 2048,
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("advisory request failed")?
            .error_for_status()
            .context("advisory endpoint returned an error status")?;
        let payload: serde_json::Value = response
            .json()
            .await
            .context("advisory response was not JSON")?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .context("advisory response had no message content")?;
        Ok(content.to_string())
    }
}
