//! AI summarization collaborator for analytics reports.
//!
//! The aggregate queries live in the parent module; this one turns their
//! output into a prose summary. `Summarizer` is the seam: production uses
//! the OpenAI chat-completions API, tests substitute a stub.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::AdvisorSettings;

pub const API_KEY_ENV: &str = "RACKSCAN_OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request failed")]
    Transport(#[from] reqwest::Error),
    #[error("advisor returned a malformed response")]
    MalformedResponse,
    #[error("no API key set ({API_KEY_ENV})")]
    MissingApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    BatteryEfficiency,
    MovementPatterns,
    Performance,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::BatteryEfficiency => "battery efficiency",
            AnalysisKind::MovementPatterns => "movement patterns",
            AnalysisKind::Performance => "performance",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            AnalysisKind::BatteryEfficiency => {
                "You are a battery efficiency analyst for drone operations. \
                 Focus on comparing actual vs recommended metrics and providing actionable insights."
            }
            AnalysisKind::MovementPatterns => {
                "You are a movement pattern analyst for drone operations. \
                 Analyze flight patterns for efficiency."
            }
            AnalysisKind::Performance => {
                "You are a drone performance analyst. \
                 Focus on overall efficiency metrics and optimization opportunities."
            }
        }
    }

    fn user_prompt(&self, metrics: &Value) -> String {
        match self {
            AnalysisKind::BatteryEfficiency => format!(
                "Analyze the following drone battery metrics: {metrics}\n\
                 Focus on:\n\
                 1. Comparison between actual and recommended consumption patterns\n\
                 2. Efficiency gap analysis and improvement opportunities\n\
                 3. Specific recommendations to align actual performance with recommended levels"
            ),
            AnalysisKind::MovementPatterns => format!(
                "Analyze these drone movement patterns: {metrics}\n\
                 Focus on:\n\
                 1. Most successful movement sequences\n\
                 2. Pattern correlations with scan success rates\n\
                 3. Suggested improvements for movement efficiency"
            ),
            AnalysisKind::Performance => format!(
                "Analyze this drone performance data: {metrics}\n\
                 Focus on:\n\
                 1. Overall efficiency metrics\n\
                 2. Battery usage optimization\n\
                 3. Movement pattern effectiveness\n\
                 4. Time-based performance variations"
            ),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize(&self, kind: AnalysisKind, metrics: &Value)
        -> Result<String, AdvisorError>;
}

/// Chat-completions backed summarizer.
pub struct OpenAiAdvisor {
    client: reqwest::Client,
    settings: AdvisorSettings,
    api_key: String,
}

impl OpenAiAdvisor {
    pub fn new(settings: AdvisorSettings, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            api_key,
        }
    }

    /// Build an advisor from the environment. The API key is only ever read
    /// from the environment, never persisted with the settings.
    pub fn from_env(settings: AdvisorSettings) -> Result<Self, AdvisorError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| AdvisorError::MissingApiKey)?;
        Ok(Self::new(settings, api_key))
    }
}

impl Summarizer for OpenAiAdvisor {
    async fn summarize(
        &self,
        kind: AnalysisKind,
        metrics: &Value,
    ) -> Result<String, AdvisorError> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": kind.system_prompt() },
                { "role": "user", "content": kind.user_prompt(metrics) },
            ],
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(AdvisorError::MalformedResponse)
    }
}
