//! 本地 Ollama 后端，无需鉴权

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

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Ollama 后端
pub struct OllamaBackend {
    name: String,
    model_name: String,
    max_output_tokens: u32,
    base_url: String,
    http: reqwest::Client,
    timeouts: BackendTimeouts,
}

impl OllamaBackend {
    pub fn new(descriptor: &BackendDescriptor, timeouts: BackendTimeouts) -> Self {
        Self {
            name: descriptor.name.clone(),
            model_name: descriptor.model.clone(),
            max_output_tokens: descriptor.max_output_tokens,
            base_url: descriptor.base_url(),
            http: http::build_http_client(),
            timeouts,
        }
    }

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<Completion, BackendError> {
        debug!("[{}] 调用本地 generate，模型: {}", self.name, self.model_name);

        let body = json!({
            "model": self.model_name,
            "system": SYSTEM_PROMPT,
            "prompt": compose_user_text(prompt, context),
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": self.max_output_tokens,
            },
        });

        let request = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body);

        let response: GenerateResponse = http::send_json(request, self.timeouts.query).await?;
        if response.response.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }

        let tokens_used = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
        };

        Ok(Completion {
            text: response.response,
            tokens_used,
        })
    }
}

#[async_trait]
impl AnalysisBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_budget(&self) -> u32 {
        self.max_output_tokens
    }

    async fn health_check(&self) -> bool {
        let request = self.http.get(format!("{}/api/tags", self.base_url));
        http::probe(&self.name, request, self.timeouts.health_check).await
    }

    async fn query(&self, prompt: &str, context: Option<&str>) -> QueryResult {
        let started = Instant::now();
        let outcome = self.generate(prompt, context).await;
        http::finish(&self.name, started, outcome)
    }
}
