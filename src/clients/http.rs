//! 适配器共用的 HTTP 辅助函数

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::models::query_result::QueryResult;

/// 错误信息中保留的响应体长度
const BODY_EXCERPT_CHARS: usize = 300;

/// 一次成功生成的内容
#[derive(Debug)]
pub(crate) struct Completion {
    pub text: String,
    pub tokens_used: Option<u64>,
}

pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// 截断响应体用于错误信息
pub(crate) fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_EXCERPT_CHARS {
        body.chars().take(BODY_EXCERPT_CHARS).collect::<String>() + "..."
    } else {
        body.to_string()
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        BackendError::from(err)
    }
}

/// 发送请求并把 2xx 响应体解析为 `T`
///
/// 非 2xx 返回 `BadStatus`（状态码 + 响应体摘录），解析失败返回 `MalformedResponse`。
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T, BackendError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    if !status.is_success() {
        return Err(BackendError::BadStatus {
            status: status.as_u16(),
            body: excerpt(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| BackendError::MalformedResponse(e.to_string()))
}

/// 健康检查：只有 2xx 才算成功，任何错误都返回 false
pub(crate) async fn probe(backend: &str, request: RequestBuilder, timeout: Duration) -> bool {
    match request.timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => {
            debug!("[{}] 健康检查通过", backend);
            true
        }
        Ok(response) => {
            warn!("[{}] 健康检查失败: HTTP {}", backend, response.status().as_u16());
            false
        }
        Err(e) => {
            warn!("[{}] 健康检查失败: {}", backend, transport_error(e, timeout));
            false
        }
    }
}

/// 把适配器内部结果折叠成 `QueryResult`
pub(crate) fn finish(
    backend: &str,
    started: Instant,
    outcome: Result<Completion, BackendError>,
) -> QueryResult {
    let elapsed = started.elapsed();
    match outcome {
        Ok(completion) => {
            debug!(
                "[{}] 调用成功，耗时 {:.2}s，tokens: {:?}",
                backend,
                elapsed.as_secs_f64(),
                completion.tokens_used
            );
            QueryResult::success(
                backend,
                completion.text.trim(),
                completion.tokens_used,
                elapsed,
            )
        }
        Err(e) => {
            if e.is_rate_limited() {
                warn!("[{}] ⚠️ 触发限流/配额限制: {}", backend, e);
            } else {
                warn!("[{}] ❌ 调用失败: {}", backend, e);
            }
            QueryResult::failure(Some(backend.to_string()), e.to_string()).with_elapsed(elapsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), BODY_EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn test_finish_maps_both_outcomes() {
        let ok = finish(
            "Groq",
            Instant::now(),
            Ok(Completion {
                text: " hello \n".into(),
                tokens_used: Some(3),
            }),
        );
        assert!(ok.is_success());
        assert_eq!(ok.response(), "hello");
        assert_eq!(ok.tokens_used(), Some(3));

        let failed = finish(
            "Groq",
            Instant::now(),
            Err(BackendError::BadStatus {
                status: 500,
                body: "boom".into(),
            }),
        );
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("HTTP 500: boom"));
        assert_eq!(failed.backend(), Some("Groq"));
    }
}
