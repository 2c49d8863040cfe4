use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 后端调用错误
    #[error("后端错误: {0}")]
    Backend(#[from] BackendError),
    /// 编排错误
    #[error("编排错误: {0}")]
    Orchestration(#[from] OrchestrationError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 单次后端调用的错误
///
/// 适配器内部使用，最终都会被折叠成失败的 `QueryResult`，不会越过适配器边界。
#[derive(Debug, Error)]
pub enum BackendError {
    /// 网络请求失败
    #[error("request failed: {0}")]
    Transport(String),
    /// 请求超时
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    /// 远端返回非成功状态码
    #[error("HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },
    /// 请求构建失败
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// 状态码成功但响应体无法解析
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// 响应中没有生成内容
    #[error("empty response content")]
    EmptyContent,
}

static RATE_LIMIT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(rate[ _-]?limit|quota|too many requests|resource[ _]exhausted)").ok()
});

impl BackendError {
    /// 是否为配额 / 限流类错误
    ///
    /// 仅用于日志分类，调度层对它和其他失败一视同仁。
    pub fn is_rate_limited(&self) -> bool {
        match self {
            BackendError::BadStatus { status, body } => {
                *status == 429 || is_rate_limit_text(body)
            }
            BackendError::Transport(msg) | BackendError::MalformedResponse(msg) => is_rate_limit_text(msg),
            _ => false,
        }
    }
}

/// 判断一段错误文本是否表示限流
pub fn is_rate_limit_text(text: &str) -> bool {
    RATE_LIMIT_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

/// 编排层错误
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// 注册表中没有健康的后端
    #[error("No active AI backends available")]
    NoBackendsAvailable,
    /// 输入记录为空
    #[error("No valid traffic records to analyze")]
    NoRecords,
    /// 某个分片的所有候选后端都失败了
    #[error("{0}")]
    AttemptsExhausted(String),
    /// 分片任务被取消或异常退出
    #[error("chunk task aborted: {0}")]
    TaskAborted(String),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 后端缺少凭据
    #[error("后端 {backend} 缺少 API key")]
    MissingApiKey { backend: String },
    /// 后端名称重复
    #[error("后端名称重复: {backend}")]
    DuplicateBackend { backend: String },
    /// 数值配置不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            AppError::File(FileError::NotFound { path })
        } else {
            AppError::File(FileError::ReadFailed { path, source })
        }
    }

    /// 创建配置项不合法错误
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
