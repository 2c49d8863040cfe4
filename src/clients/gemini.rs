//! Google Gemini generateContent 后端

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::debug;

use crate::clients::http::{self, Completion};
use crate::clients::{compose_user_text, AnalysisBackend, BackendTimeouts, SYSTEM_PROMPT, TEMPERATURE};
use crate::error::BackendError;
use crate::models::backend::BackendDescriptor;
use crate::models::query_result::QueryResult;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini 后端
pub struct GeminiBackend {
    name: String,
    model_name: String,
    max_output_tokens: u32,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    timeouts: BackendTimeouts,
}

impl GeminiBackend {
    pub fn new(descriptor: &BackendDescriptor, api_key: String, timeouts: BackendTimeouts) -> Self {
        Self {
            name: descriptor.name.clone(),
            model_name: descriptor.model.clone(),
            max_output_tokens: descriptor.max_output_tokens,
            base_url: descriptor.base_url(),
            api_key,
            http: http::build_http_client(),
            timeouts,
        }
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model_name)
    }

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<Completion, BackendError> {
        debug!("[{}] 调用 generateContent，模型: {}", self.name, self.model_name);

        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": compose_user_text(prompt, context) }],
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        let request = self
            .http
            .post(format!("{}:generateContent", self.model_url()))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body);

        let response: GenerateContentResponse = http::send_json(request, self.timeouts.query).await?;

        if response.candidates.is_empty() {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(BackendError::MalformedResponse(format!("blocked: {}", reason)));
        }

        let text = response
            .candidates
            .iter()
            .take(1)
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect::<String>();
        if text.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }

        Ok(Completion {
            text,
            tokens_used: response.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_budget(&self) -> u32 {
        self.max_output_tokens
    }

    async fn health_check(&self) -> bool {
        let request = self
            .http
            .get(self.model_url())
            .header(API_KEY_HEADER, &self.api_key);
        http::probe(&self.name, request, self.timeouts.health_check).await
    }

    async fn query(&self, prompt: &str, context: Option<&str>) -> QueryResult {
        let started = Instant::now();
        let outcome = self.generate(prompt, context).await;
        http::finish(&self.name, started, outcome)
    }
}
