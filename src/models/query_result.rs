//! 单次后端调用的结果

use serde::Serialize;
use std::time::Duration;

/// 一次后端调用的结果
///
/// 每次调用恰好产生一个，之后不再修改：
/// - 成功的结果一定有非空的响应文本
/// - 失败的结果一定有非空的错误描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    success: bool,
    response: String,
    error: Option<String>,
    backend: Option<String>,
    tokens_used: Option<u64>,
    elapsed: Option<Duration>,
    chunk_id: Option<String>,
}

impl QueryResult {
    /// 成功结果。响应文本为空时降级为失败结果。
    pub fn success(
        backend: impl Into<String>,
        response: impl Into<String>,
        tokens_used: Option<u64>,
        elapsed: Duration,
    ) -> Self {
        let backend = backend.into();
        let response = response.into();
        if response.trim().is_empty() {
            return Self::failure(Some(backend), "empty response content");
        }
        Self {
            success: true,
            response,
            error: None,
            backend: Some(backend),
            tokens_used,
            elapsed: Some(elapsed),
            chunk_id: None,
        }
    }

    /// 失败结果
    pub fn failure(backend: Option<String>, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            success: false,
            response: String::new(),
            error: Some(error),
            backend,
            tokens_used: None,
            elapsed: None,
            chunk_id: None,
        }
    }

    /// 附加耗时（失败结果也可以记录耗时）
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// 标记所属分片
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    pub fn tokens_used(&self) -> Option<u64> {
        self.tokens_used
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn chunk_id(&self) -> Option<&str> {
        self.chunk_id.as_deref()
    }
}
