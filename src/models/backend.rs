//! 后端描述信息

use serde::{Deserialize, Serialize};
use std::fmt;

/// 后端类型，决定线上协议和鉴权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Groq（OpenAI 兼容接口，Bearer 鉴权）
    Groq,
    /// OpenAI（Bearer 鉴权）
    #[serde(alias = "open_ai")]
    OpenAi,
    /// Anthropic Messages API（x-api-key 鉴权）
    Anthropic,
    /// Google Gemini generateContent（x-goog-api-key 鉴权）
    Gemini,
    /// 本地 Ollama 服务（无鉴权）
    Ollama,
}

impl BackendKind {
    /// 默认显示名称，同时作为权重表的键
    pub fn display_name(self) -> &'static str {
        match self {
            BackendKind::Groq => "Groq",
            BackendKind::OpenAi => "OpenAI",
            BackendKind::Anthropic => "Anthropic",
            BackendKind::Gemini => "Google Gemini",
            BackendKind::Ollama => "Ollama",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            BackendKind::Groq => "https://api.groq.com/openai/v1",
            BackendKind::OpenAi => "https://api.openai.com/v1",
            BackendKind::Anthropic => "https://api.anthropic.com/v1",
            BackendKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            BackendKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            BackendKind::Groq => "llama-3.3-70b-versatile",
            BackendKind::OpenAi => "gpt-3.5-turbo",
            BackendKind::Anthropic => "claude-3-sonnet-20240229",
            BackendKind::Gemini => "gemini-2.0-flash",
            BackendKind::Ollama => "llama3",
        }
    }

    /// 默认输出预算（token）
    pub fn default_output_budget(self, model: &str) -> u32 {
        match self {
            BackendKind::Groq | BackendKind::Gemini => 8192,
            BackendKind::OpenAi if model.contains("gpt-3.5") => 4096,
            BackendKind::OpenAi => 8192,
            BackendKind::Anthropic | BackendKind::Ollama => 4096,
        }
    }

    /// 是否需要 API key
    pub fn requires_api_key(self) -> bool {
        !matches!(self, BackendKind::Ollama)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// 单个分析后端的配置与身份
///
/// 构造后不再修改。`name` 在注册表中唯一。
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    /// 为空时使用 `BackendKind::default_endpoint`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_output_tokens: u32,
}

impl BackendDescriptor {
    /// 使用类型默认值创建描述
    pub fn new(kind: BackendKind, api_key: Option<String>) -> Self {
        let model = kind.default_model().to_string();
        Self {
            name: kind.display_name().to_string(),
            kind,
            endpoint: None,
            api_key,
            max_output_tokens: kind.default_output_budget(&model),
            model,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.max_output_tokens = self.kind.default_output_budget(&self.model);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 实际使用的端点（去掉末尾的 `/`）
    pub fn base_url(&self) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
            .trim_end_matches('/')
            .to_string()
    }
}

// 手动实现 Debug，避免把 API key 打进日志
impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("endpoint", &self.base_url())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}
