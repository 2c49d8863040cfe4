//! OpenAI 兼容后端（Groq / OpenAI）
//!
//! ## 技术栈
//! - 请求和响应使用 `async-openai` 的 Chat Completions 类型
//! - 通过 `reqwest` 发送到 `{base}/chat/completions`，同时支持 Groq 和 OpenAI
//! - 每次查询只发一次请求，429 / 5xx 直接返回失败，由上层故障转移
//! - 健康检查直接请求 `GET {base}/models`

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse,
};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

use crate::clients::http::{self, Completion};
use crate::clients::{AnalysisBackend, BackendTimeouts, SYSTEM_PROMPT, TEMPERATURE};
use crate::error::BackendError;
use crate::models::backend::BackendDescriptor;
use crate::models::query_result::QueryResult;

/// OpenAI 兼容后端
pub struct OpenAiCompatBackend {
    name: String,
    model_name: String,
    max_output_tokens: u32,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    timeouts: BackendTimeouts,
}

impl OpenAiCompatBackend {
    pub fn new(descriptor: &BackendDescriptor, api_key: String, timeouts: BackendTimeouts) -> Self {
        let base_url = descriptor.base_url();

        Self {
            name: descriptor.name.clone(),
            model_name: descriptor.model.clone(),
            max_output_tokens: descriptor.max_output_tokens,
            base_url,
            api_key,
            http: http::build_http_client(),
            timeouts,
        }
    }

    /// 构建消息列表：系统提示 → 上下文（可选）→ 用户问题
    fn build_messages(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, BackendError> {
        let invalid = |e: async_openai::error::OpenAIError| BackendError::InvalidRequest(e.to_string());

        let mut messages = Vec::new();

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(invalid)?;
        messages.push(ChatCompletionRequestMessage::System(system_msg));

        if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
            let context_msg = ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Context:\n{}", ctx))
                .build()
                .map_err(invalid)?;
            messages.push(ChatCompletionRequestMessage::User(context_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(invalid)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }

    async fn chat(&self, prompt: &str, context: Option<&str>) -> Result<Completion, BackendError> {
        debug!("[{}] 调用 Chat Completions，模型: {}", self.name, self.model_name);

        let messages = self.build_messages(prompt, context)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_tokens(self.max_output_tokens)
            .build()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

        let http_request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request);
        let response: CreateChatCompletionResponse =
            http::send_json(http_request, self.timeouts.query).await?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(BackendError::EmptyContent)?;

        Ok(Completion {
            text,
            tokens_used: response.usage.as_ref().map(|u| u64::from(u.total_tokens)),
        })
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_budget(&self) -> u32 {
        self.max_output_tokens
    }

    async fn health_check(&self) -> bool {
        let request = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key);
        http::probe(&self.name, request, self.timeouts.health_check).await
    }

    async fn query(&self, prompt: &str, context: Option<&str>) -> QueryResult {
        let started = Instant::now();
        let outcome = self.chat(prompt, context).await;
        http::finish(&self.name, started, outcome)
    }
}
