//! 后端适配器 - 基础设施层
//!
//! 每种分析服务一个适配器，对外只暴露统一的能力集合：
//! `health_check` / `query` / `name` / `output_budget`。
//! 调用方只持有 `BackendHandle`，从不接触具体类型。
//!
//! | 类型 | 协议 | 鉴权 |
//! |------|------|------|
//! | Groq / OpenAI | Chat Completions（`async-openai`） | Bearer |
//! | Anthropic | Messages API | `x-api-key` |
//! | Gemini | generateContent | `x-goog-api-key` |
//! | Ollama | `/api/generate` | 无 |

pub mod anthropic;
pub mod gemini;
pub(crate) mod http;
pub mod ollama;
pub mod openai_compat;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::models::backend::{BackendDescriptor, BackendKind};
use crate::models::query_result::QueryResult;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;

/// 所有后端共用的系统提示
pub const SYSTEM_PROMPT: &str = "You are a network security expert analyzing packet capture data. \
Provide detailed, actionable insights.";

/// 生成温度
pub(crate) const TEMPERATURE: f32 = 0.1;

/// 分析后端的统一能力
///
/// `health_check` 和 `query` 都不会返回错误：
/// 所有网络错误、超时、非成功状态码都被折叠成 `false` 或失败的 `QueryResult`。
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// 稳定的后端名称（注册表中的唯一键）
    fn name(&self) -> &str;

    /// 最大输出 token 数
    fn output_budget(&self) -> u32;

    /// 轻量级连通性检查，只有明确的成功响应才返回 true
    async fn health_check(&self) -> bool;

    /// 执行一次 prompt + context 查询
    async fn query(&self, prompt: &str, context: Option<&str>) -> QueryResult;
}

/// 运行时多态的后端句柄
pub type BackendHandle = Arc<dyn AnalysisBackend>;

/// 适配器使用的超时设置
#[derive(Debug, Clone, Copy)]
pub struct BackendTimeouts {
    pub health_check: Duration,
    pub query: Duration,
}

impl BackendTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            health_check: config.health_check_timeout(),
            query: config.query_timeout(),
        }
    }
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            health_check: Duration::from_secs(10),
            query: Duration::from_secs(60),
        }
    }
}

/// 根据描述创建后端句柄
///
/// 需要鉴权的后端缺少 API key 时返回配置错误。
pub fn build_backend(
    descriptor: &BackendDescriptor,
    timeouts: BackendTimeouts,
) -> AppResult<BackendHandle> {
    let api_key = descriptor.api_key.clone().unwrap_or_default();
    if descriptor.kind.requires_api_key() && api_key.trim().is_empty() {
        return Err(ConfigError::MissingApiKey {
            backend: descriptor.name.clone(),
        }
        .into());
    }

    let handle: BackendHandle = match descriptor.kind {
        BackendKind::Groq | BackendKind::OpenAi => {
            Arc::new(OpenAiCompatBackend::new(descriptor, api_key, timeouts))
        }
        BackendKind::Anthropic => Arc::new(AnthropicBackend::new(descriptor, api_key, timeouts)),
        BackendKind::Gemini => Arc::new(GeminiBackend::new(descriptor, api_key, timeouts)),
        BackendKind::Ollama => Arc::new(OllamaBackend::new(descriptor, timeouts)),
    };
    Ok(handle)
}

/// 把可选的上下文块和用户问题拼接成一条用户消息
pub(crate) fn compose_user_text(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => format!("Context:\n{}\n\n{}", ctx, prompt),
        _ => prompt.to_string(),
    }
}
