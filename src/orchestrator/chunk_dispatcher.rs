//! 分片并发调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **并发控制**：每个分片一个 `tokio::spawn` 任务，配置了上限时用 Semaphore 限制同时运行的数量
//! 2. **结果收集**：按分片顺序收集结果，慢分片不会阻塞其他分片的执行
//! 3. **异常兜底**：任务 panic 或被取消时，为该分片生成失败结果，不会丢失
//! 4. **整体截止时间**：到期后取消剩余任务，已完成的结果保留

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::clients::BackendHandle;
use crate::error::OrchestrationError;
use crate::models::chunk::RecordChunk;
use crate::models::query_result::QueryResult;
use crate::workflow::{ChunkCtx, ChunkFlow};

/// 一次调度的参数
pub struct DispatchPlan {
    pub request_id: u64,
    pub prompt: Arc<str>,
    pub candidates: Arc<[BackendHandle]>,
    /// 并发上限，`None` 时所有分片同时执行
    pub max_concurrent: Option<usize>,
    pub deadline: Option<Duration>,
}

/// 并发处理所有分片，返回与分片一一对应的结果
pub async fn dispatch_chunks(
    flow: Arc<ChunkFlow>,
    chunks: Vec<Arc<RecordChunk>>,
    plan: DispatchPlan,
) -> Vec<QueryResult> {
    let chunk_total = chunks.len();
    let permits = plan.max_concurrent.unwrap_or(chunk_total).max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let deadline = plan.deadline.map(|d| Instant::now() + d);

    let mut handles = Vec::with_capacity(chunk_total);
    for chunk in &chunks {
        let ctx = ChunkCtx::new(
            plan.request_id,
            chunk.index + 1,
            chunk_total,
            chunk.chunk_id.clone(),
        );
        let flow = flow.clone();
        let chunk = chunk.clone();
        let prompt = plan.prompt.clone();
        let candidates = plan.candidates.clone();
        let semaphore = semaphore.clone();

        let handle = tokio::spawn(async move {
            // Semaphore 不会被关闭，获取失败时直接执行
            let _permit = semaphore.acquire_owned().await.ok();
            flow.run(&prompt, &chunk, &candidates, &ctx).await
        });
        handles.push(handle);
    }

    let mut results = Vec::with_capacity(chunk_total);
    for (chunk, mut handle) in chunks.iter().zip(handles) {
        let joined = match deadline {
            Some(at) => match tokio::time::timeout_at(at, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!(
                        "[请求 #{}] ⏰ 分片 {} 超过整体截止时间，已取消",
                        plan.request_id, chunk.chunk_id
                    );
                    results.push(aborted(chunk, "request deadline exceeded"));
                    continue;
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                error!(
                    "[请求 #{}] 分片 {} 任务执行失败: {}",
                    plan.request_id, chunk.chunk_id, e
                );
                results.push(aborted(chunk, &e.to_string()));
            }
        }
    }

    results
}

fn aborted(chunk: &RecordChunk, reason: &str) -> QueryResult {
    QueryResult::failure(None, OrchestrationError::TaskAborted(reason.to_string()).to_string())
        .with_chunk_id(&chunk.chunk_id)
}
