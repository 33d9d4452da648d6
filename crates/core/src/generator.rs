//! Prose health-summary generation.
//!
//! This is a collaborator of the summary pipeline rather than part of it: it takes a patient's
//! identity and condition list and returns free text. A generator failure is rendered inline
//! as an error string by [`render_summary_text`] and never fails the caller.

use crate::config::{join_path, parse_base_url};
use crate::constants::{
    DEFAULT_GENERATOR_BASE, DEFAULT_GENERATOR_MODEL, GENERATOR_TEMPERATURE, GENERATOR_TIMEOUT,
};
use crate::error::{ConfigError, ConfigResult, GeneratorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Environment variable names recognised by [`GeneratorConfig::from_env_values`].
pub mod env {
    pub const API_KEY: &str = "OPENAI_API_KEY";
    pub const BASE_URL: &str = "SMART_GENERATOR_BASE";
    pub const MODEL: &str = "SMART_GENERATOR_MODEL";
}

const SYSTEM_PROMPT: &str =
    "You are a helpful healthcare assistant with expertise in medical data and clinical trials.";

/// Input to the generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRequest {
    pub patient_id: String,
    pub display_name: String,
    pub conditions: Vec<String>,
}

/// Anything that can turn a [`SummaryRequest`] into prose.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, request: &SummaryRequest) -> Result<String, GeneratorError>;
}

/// Generate text, rendering any failure as an inline error string.
pub async fn render_summary_text(
    generator: &dyn SummaryGenerator,
    request: &SummaryRequest,
) -> String {
    match generator.generate(request).await {
        Ok(text) => text,
        Err(e) => {
            error!("Summary generation failed: {}", e);
            format!("Error generating health summary: {e}")
        }
    }
}

/// Build the user prompt. The wording differs when no conditions are known.
pub fn build_prompt(request: &SummaryRequest) -> String {
    let intro = "You are a healthcare assistant that helps process patient data and match \
                 patients to clinical trials.";

    if request.conditions.is_empty() {
        format!(
            "{intro}\n\n\
             Patient Information:\n\
             - ID: {id}\n\
             - Name: {name}\n\
             - No specific conditions found in records\n\n\
             Please provide:\n\
             1. A general health summary based on limited information\n\
             2. Suggestions for common clinical trials that might be relevant for general health screening\n\
             3. General health advice and preventive care recommendations\n\n\
             Format your response in clear sections with headings.",
            id = request.patient_id,
            name = request.display_name,
        )
    } else {
        format!(
            "{intro}\n\n\
             Patient Information:\n\
             - ID: {id}\n\
             - Name: {name}\n\
             - Conditions: {conditions}\n\n\
             Please provide:\n\
             1. A brief discharge summary based on the conditions\n\
             2. Recommendations for clinical trials that might be relevant for this patient\n\
             3. Any general health advice based on the conditions\n\n\
             Format your response in clear sections with headings.",
            id = request.patient_id,
            name = request.display_name,
            conditions = request.conditions.join(", "),
        )
    }
}

/// Settings for [`ChatSummaryGenerator`].
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeneratorConfig {
    /// Resolve from raw values. The API key is required; base URL and model have defaults.
    pub fn from_env_values(
        api_key: Option<String>,
        base_url: Option<String>,
        model: Option<String>,
    ) -> ConfigResult<Self> {
        let api_key = api_key
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::InvalidInput(format!("{} is not set", env::API_KEY)))?;
        let base_url = base_url
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GENERATOR_BASE.into());
        let model = model
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GENERATOR_MODEL.into());

        Ok(Self {
            base_url,
            api_key,
            model,
        })
    }

    /// Read the recognised variables once.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_env_values(
            std::env::var(env::API_KEY).ok(),
            std::env::var(env::BASE_URL).ok(),
            std::env::var(env::MODEL).ok(),
        )
    }
}

/// OpenAI-compatible chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// [`SummaryGenerator`] backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone, Debug)]
pub struct ChatSummaryGenerator {
    http: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
    model: String,
}

impl ChatSummaryGenerator {
    pub fn new(config: GeneratorConfig) -> ConfigResult<Self> {
        let base = parse_base_url(&config.base_url, "generator base_url")?;
        let endpoint = join_path(&base, "v1/chat/completions");
        let http = reqwest::Client::builder()
            .timeout(GENERATOR_TIMEOUT)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

#[async_trait]
impl SummaryGenerator for ChatSummaryGenerator {
    async fn generate(&self, request: &SummaryRequest) -> Result<String, GeneratorError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: GENERATOR_TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: build_prompt(request),
                },
            ],
        };
        debug!("Requesting summary from {} with model {}", self.endpoint, self.model);

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(GeneratorError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(GeneratorError::InvalidResponse)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GeneratorError::EmptyResponse)
    }
}
