//! Anthropic Messages API 后端

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

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 健康检查请求的输出上限
const PROBE_MAX_TOKENS: u32 = 10;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Anthropic 后端
pub struct AnthropicBackend {
    name: String,
    model_name: String,
    max_output_tokens: u32,
    messages_url: String,
    api_key: String,
    http: reqwest::Client,
    timeouts: BackendTimeouts,
}

impl AnthropicBackend {
    pub fn new(descriptor: &BackendDescriptor, api_key: String, timeouts: BackendTimeouts) -> Self {
        Self {
            name: descriptor.name.clone(),
            model_name: descriptor.model.clone(),
            max_output_tokens: descriptor.max_output_tokens,
            messages_url: format!("{}/messages", descriptor.base_url()),
            api_key,
            http: http::build_http_client(),
            timeouts,
        }
    }

    fn request(&self, body: serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
    }

    async fn messages(&self, prompt: &str, context: Option<&str>) -> Result<Completion, BackendError> {
        debug!("[{}] 调用 Messages API，模型: {}", self.name, self.model_name);

        let body = json!({
            "model": self.model_name,
            "max_tokens": self.max_output_tokens,
            "temperature": TEMPERATURE,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": compose_user_text(prompt, context) }
            ],
        });

        let response: MessagesResponse = http::send_json(self.request(body), self.timeouts.query).await?;

        let text = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }

        Ok(Completion {
            text,
            tokens_used: response.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }
}

#[async_trait]
impl AnalysisBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_budget(&self) -> u32 {
        self.max_output_tokens
    }

    /// 没有轻量的 models 接口，用一个极小的请求代替
    async fn health_check(&self) -> bool {
        let body = json!({
            "model": self.model_name,
            "max_tokens": PROBE_MAX_TOKENS,
            "messages": [{ "role": "user", "content": "Hello" }],
        });
        http::probe(&self.name, self.request(body), self.timeouts.health_check).await
    }

    async fn query(&self, prompt: &str, context: Option<&str>) -> QueryResult {
        let started = Instant::now();
        let outcome = self.messages(prompt, context).await;
        http::finish(&self.name, started, outcome)
    }
}
