use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::backend::{BackendDescriptor, BackendKind};

/// 每条记录的平均字节数，近似真实抓包开销
pub const DEFAULT_AVERAGE_RECORD_BYTES: u64 = 1500;

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 已配置的后端
    pub backends: Vec<BackendDescriptor>,
    /// 后端名称 → 目标占比（百分比）
    pub backend_weights: HashMap<String, f64>,
    /// 是否启用加权自平衡选择（关闭时使用轮询）
    pub use_weighted_balancing: bool,
    /// 轮询模式下无排除时是否轮转
    pub rotate_round_robin: bool,
    /// 单个分片的大小上限（MB）
    pub chunk_size_mb: f64,
    /// 单个分片的记录数上限
    pub max_records_per_chunk: usize,
    /// 估算大小时使用的单条记录字节数
    pub average_record_bytes: u64,
    /// 单个分片最多尝试的后端数量
    pub max_attempts_per_chunk: usize,
    /// 同时调度的分片数量上限，`None` 时所有分片同时执行
    pub max_concurrent_chunks: Option<usize>,
    /// 健康检查超时（秒）
    pub health_check_timeout_secs: u64,
    /// 查询超时（秒）
    pub query_timeout_secs: u64,
    /// 整个请求的截止时间（秒），超时后未完成的分片整体取消
    pub request_deadline_secs: Option<u64>,
    /// 选择器随机种子（测试用）
    pub selection_seed: Option<u64>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            backend_weights: default_weights(),
            use_weighted_balancing: true,
            rotate_round_robin: true,
            chunk_size_mb: 5.0,
            max_records_per_chunk: 5000,
            average_record_bytes: DEFAULT_AVERAGE_RECORD_BYTES,
            max_attempts_per_chunk: 3,
            max_concurrent_chunks: None,
            health_check_timeout_secs: 10,
            query_timeout_secs: 60,
            request_deadline_secs: None,
            selection_seed: None,
            verbose_logging: false,
        }
    }
}

fn default_weights() -> HashMap<String, f64> {
    HashMap::from([
        (BackendKind::Groq.display_name().to_string(), 30.0),
        (BackendKind::OpenAi.display_name().to_string(), 35.0),
        (BackendKind::Gemini.display_name().to_string(), 35.0),
        (BackendKind::Anthropic.display_name().to_string(), 30.0),
    ])
}

/// 每种后端对应的环境变量前缀
const ENV_PREFIXES: [(BackendKind, &str); 5] = [
    (BackendKind::Groq, "GROQ"),
    (BackendKind::OpenAi, "OPENAI"),
    (BackendKind::Anthropic, "ANTHROPIC"),
    (BackendKind::Gemini, "GEMINI"),
    (BackendKind::Ollama, "OLLAMA"),
];

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置，`from_env` 基于此实现
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let mut backend_weights = default.backend_weights.clone();
        for (kind, prefix) in ENV_PREFIXES {
            if let Some(weight) = parse_var(&lookup, &format!("{}_WEIGHT", prefix)) {
                backend_weights.insert(kind.display_name().to_string(), weight);
            }
        }

        Self {
            backends: backends_from_lookup(&lookup),
            backend_weights,
            use_weighted_balancing: lookup("USE_WEIGHTED_BALANCING")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(default.use_weighted_balancing),
            rotate_round_robin: parse_var(&lookup, "ROTATE_ROUND_ROBIN").unwrap_or(default.rotate_round_robin),
            chunk_size_mb: parse_var(&lookup, "CHUNK_SIZE_MB").unwrap_or(default.chunk_size_mb),
            max_records_per_chunk: parse_var(&lookup, "MAX_RECORDS_PER_CHUNK").unwrap_or(default.max_records_per_chunk),
            average_record_bytes: parse_var(&lookup, "AVERAGE_RECORD_BYTES").unwrap_or(default.average_record_bytes),
            max_attempts_per_chunk: parse_var(&lookup, "MAX_ATTEMPTS_PER_CHUNK").unwrap_or(default.max_attempts_per_chunk),
            max_concurrent_chunks: parse_var(&lookup, "MAX_CONCURRENT_CHUNKS").or(default.max_concurrent_chunks),
            health_check_timeout_secs: parse_var(&lookup, "HEALTH_CHECK_TIMEOUT_SECS").unwrap_or(default.health_check_timeout_secs),
            query_timeout_secs: parse_var(&lookup, "QUERY_TIMEOUT_SECS").unwrap_or(default.query_timeout_secs),
            request_deadline_secs: parse_var(&lookup, "REQUEST_DEADLINE_SECS").or(default.request_deadline_secs),
            selection_seed: parse_var(&lookup, "SELECTION_SEED").or(default.selection_seed),
            verbose_logging: parse_var(&lookup, "VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 分片大小上限（字节）
    pub fn chunk_size_bytes(&self) -> u64 {
        (self.chunk_size_mb * 1024.0 * 1024.0) as u64
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_secs.map(Duration::from_secs)
    }

    /// 某个后端的目标占比，未配置时返回 `None`
    pub fn weight_for(&self, backend_name: &str) -> Option<f64> {
        self.backend_weights.get(backend_name).copied()
    }

    /// 校验配置
    pub fn validate(&self) -> AppResult<()> {
        if !(self.chunk_size_mb.is_finite() && self.chunk_size_mb > 0.0) {
            return Err(AppError::invalid_config("chunk_size_mb", "必须大于 0"));
        }
        if self.max_records_per_chunk == 0 {
            return Err(AppError::invalid_config("max_records_per_chunk", "必须大于 0"));
        }
        if self.max_attempts_per_chunk == 0 {
            return Err(AppError::invalid_config("max_attempts_per_chunk", "必须大于 0"));
        }
        if self.max_concurrent_chunks == Some(0) {
            return Err(AppError::invalid_config("max_concurrent_chunks", "必须大于 0"));
        }
        if let Some((name, _)) = self.backend_weights.iter().find(|(_, w)| w.is_nan() || **w < 0.0) {
            return Err(AppError::invalid_config(
                format!("backend_weights.{}", name),
                "权重不能为负数",
            ));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                return Err(ConfigError::DuplicateBackend {
                    backend: backend.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// 读取并解析单个变量，缺失或无法解析时返回 `None`
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn is_placeholder(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || (key.starts_with("your_") && key.ends_with("_here"))
}

/// 根据环境变量发现可用的后端
///
/// 云端后端需要 `<PREFIX>_API_KEY`（占位符会被忽略），本地 Ollama 需要 `OLLAMA_MODEL`。
fn backends_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Vec<BackendDescriptor> {
    let mut backends = Vec::new();

    for (kind, prefix) in ENV_PREFIXES {
        let api_key = lookup(&format!("{}_API_KEY", prefix)).filter(|k| !is_placeholder(k));
        let model = lookup(&format!("{}_MODEL", prefix)).filter(|m| !m.trim().is_empty());

        let enabled = if kind.requires_api_key() {
            api_key.is_some()
        } else {
            model.is_some()
        };
        if !enabled {
            continue;
        }

        let mut descriptor = BackendDescriptor::new(kind, api_key);
        if let Some(model) = model {
            descriptor = descriptor.with_model(model);
        }
        let endpoint_var = match kind {
            BackendKind::Ollama => "OLLAMA_BASE_URL".to_string(),
            _ => format!("{}_BASE_URL", prefix),
        };
        if let Some(endpoint) = lookup(&endpoint_var) {
            descriptor = descriptor.with_endpoint(endpoint);
        }
        backends.push(descriptor);
    }

    backends
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_records_per_chunk, 5000);
        assert_eq!(config.chunk_size_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.max_attempts_per_chunk, 3);
        assert_eq!(config.weight_for("OpenAI"), Some(35.0));
        assert!(config.use_weighted_balancing);
        assert_eq!(config.max_concurrent_chunks, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backends_discovered_from_keys() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "gsk_live"),
            ("OPENAI_API_KEY", "your_openai_api_key_here"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ANTHROPIC_MODEL", "claude-3-haiku-20240307"),
            ("OLLAMA_MODEL", "mistral"),
            ("OLLAMA_BASE_URL", "http://127.0.0.1:11434"),
        ]));

        let names: Vec<&str> = config.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Groq", "Anthropic", "Ollama"]);
        assert_eq!(config.backends[1].model, "claude-3-haiku-20240307");
        assert_eq!(config.backends[2].base_url(), "http://127.0.0.1:11434");
        assert!(config.backends[2].api_key.is_none());
    }

    #[test]
    fn test_weights_and_flags_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_WEIGHT", "50"),
            ("USE_WEIGHTED_BALANCING", "FALSE"),
            ("MAX_RECORDS_PER_CHUNK", "1000"),
            ("SELECTION_SEED", "7"),
            ("CHUNK_SIZE_MB", "not-a-number"),
        ]));

        assert_eq!(config.weight_for("Groq"), Some(50.0));
        assert_eq!(config.weight_for("Anthropic"), Some(30.0));
        assert!(!config.use_weighted_balancing);
        assert_eq!(config.max_records_per_chunk, 1000);
        assert_eq!(config.selection_seed, Some(7));
        assert_eq!(config.chunk_size_mb, 5.0);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_limits() {
        let mut config = Config::default();
        config.backends = vec![
            BackendDescriptor::new(BackendKind::Groq, Some("a".into())),
            BackendDescriptor::new(BackendKind::Groq, Some("b".into())),
        ];
        assert!(matches!(
            config.validate(),
            Err(AppError::Config(ConfigError::DuplicateBackend { .. }))
        ));

        let mut config = Config::default();
        config.max_records_per_chunk = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_concurrent_chunks = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_chunk_size() {
        for size in [f64::NAN, f64::INFINITY, 0.0, -1.0] {
            let mut config = Config::default();
            config.chunk_size_mb = size;
            assert!(config.validate().is_err(), "chunk_size_mb = {}", size);
        }
    }

    #[test]
    fn test_each_field_parses_with_its_own_type() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_WEIGHT", "12.5"),
            ("ROTATE_ROUND_ROBIN", "false"),
            ("CHUNK_SIZE_MB", "2.5"),
            ("AVERAGE_RECORD_BYTES", "900"),
            ("MAX_ATTEMPTS_PER_CHUNK", "2"),
            ("MAX_CONCURRENT_CHUNKS", "4"),
            ("QUERY_TIMEOUT_SECS", " 30 "),
            ("REQUEST_DEADLINE_SECS", "120"),
            ("VERBOSE_LOGGING", "true"),
        ]));

        assert_eq!(config.weight_for("OpenAI"), Some(12.5));
        assert!(!config.rotate_round_robin);
        assert_eq!(config.chunk_size_mb, 2.5);
        assert_eq!(config.average_record_bytes, 900);
        assert_eq!(config.max_attempts_per_chunk, 2);
        assert_eq!(config.max_concurrent_chunks, Some(4));
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_deadline(), Some(Duration::from_secs(120)));
        assert!(config.verbose_logging);
    }
}
