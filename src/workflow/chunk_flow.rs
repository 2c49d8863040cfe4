//! 单个分片的处理流程 - 流程层
//!
//! 流程顺序：
//! 1. 渲染分片上下文（只做一次）
//! 2. 选择一个还没试过的后端 → 查询
//! 3. 成功立即返回；失败记录 `后端: 错误` 并排除该后端，换下一个
//! 4. 次数用尽后返回失败结果，错误信息为所有尝试记录用 `"; "` 拼接

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::BackendHandle;
use crate::error::{is_rate_limit_text, OrchestrationError};
use crate::models::chunk::RecordChunk;
use crate::models::query_result::QueryResult;
use crate::services::digest::render_context;
use crate::services::{BackendRegistry, BackendSelector};
use crate::workflow::chunk_ctx::ChunkCtx;

/// 单个分片的故障转移流程
///
/// - 不持有后端资源，只借用注册表和选择器
/// - 每个分片有独立的排除集合
pub struct ChunkFlow {
    registry: Arc<BackendRegistry>,
    selector: Arc<BackendSelector>,
    max_attempts: usize,
}

impl ChunkFlow {
    pub fn new(
        registry: Arc<BackendRegistry>,
        selector: Arc<BackendSelector>,
        max_attempts: usize,
    ) -> Self {
        Self {
            registry,
            selector,
            max_attempts,
        }
    }

    pub async fn run(
        &self,
        prompt: &str,
        chunk: &RecordChunk,
        candidates: &[BackendHandle],
        ctx: &ChunkCtx,
    ) -> QueryResult {
        let context = render_context(chunk);
        let attempts = candidates.len().min(self.max_attempts);

        let mut excluded: HashSet<String> = HashSet::new();
        let mut attempt_log: Vec<String> = Vec::new();

        for attempt in 1..=attempts {
            let Some(backend) = self.selector.select(&self.registry, candidates, &excluded) else {
                break;
            };

            info!(
                "{} 🤖 第 {}/{} 次尝试，后端: {}",
                ctx,
                attempt,
                attempts,
                backend.name()
            );

            let result = backend.query(prompt, Some(&context)).await;
            if result.is_success() {
                info!("{} ✓ {} 分析完成", ctx, backend.name());
                return result.with_chunk_id(&chunk.chunk_id);
            }

            let error = result.error().unwrap_or("unknown error").to_string();
            if is_rate_limit_text(&error) {
                warn!("{} ⚠️ {} 触发限流，切换后端", ctx, backend.name());
            } else {
                warn!("{} ❌ {} 失败: {}", ctx, backend.name(), error);
            }

            attempt_log.push(format!("{}: {}", backend.name(), error));
            excluded.insert(backend.name().to_string());
        }

        warn!("{} ❌ 所有尝试均失败", ctx);
        let reason = if attempt_log.is_empty() {
            OrchestrationError::NoBackendsAvailable.to_string()
        } else {
            OrchestrationError::AttemptsExhausted(attempt_log.join("; ")).to_string()
        };
        QueryResult::failure(None, reason).with_chunk_id(&chunk.chunk_id)
    }
}
