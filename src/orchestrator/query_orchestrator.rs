//! 查询编排器
//!
//! 应用入口：持有注册表和选择器，把一次查询拆成
//! 分片 → 并发调度 → 汇总 三步。

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::BackendHandle;
use crate::config::Config;
use crate::error::{AppResult, OrchestrationError};
use crate::models::query_result::QueryResult;
use crate::models::record::TrafficRecord;
use crate::orchestrator::chunk_dispatcher::{dispatch_chunks, DispatchPlan};
use crate::services::{BackendRegistry, BackendSelector, ChunkPartitioner, ResponseAggregator};
use crate::utils::logging;
use crate::workflow::ChunkFlow;

/// 一次查询的最终结果
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub combined_text: String,
    pub per_chunk_results: Vec<QueryResult>,
    pub error_summary: Option<String>,
}

impl QueryOutcome {
    fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            per_chunk_results: vec![QueryResult::failure(None, error.clone())],
            combined_text: error.clone(),
            error_summary: Some(error),
        }
    }
}

pub struct QueryOrchestrator {
    config: Config,
    registry: Arc<BackendRegistry>,
    selector: Arc<BackendSelector>,
    partitioner: ChunkPartitioner,
    next_request_id: AtomicU64,
}

impl QueryOrchestrator {
    /// 校验配置、创建并探测所有后端
    pub async fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        logging::log_startup(&config);

        let registry = BackendRegistry::initialize(&config).await;
        Ok(Self::with_registry(config, registry))
    }

    /// 使用已构建好的注册表（测试或自定义后端）
    pub fn with_registry(config: Config, registry: BackendRegistry) -> Self {
        Self {
            selector: Arc::new(BackendSelector::new(&config)),
            partitioner: ChunkPartitioner::from_config(&config),
            registry: Arc::new(registry),
            config,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// 执行一次查询
    ///
    /// `backend_override` 命中健康后端时，本次请求的所有分片都只使用该后端。
    pub async fn run_query(
        &self,
        prompt: &str,
        records: &[TrafficRecord],
        backend_override: Option<&str>,
    ) -> QueryOutcome {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);

        if self.registry.is_empty() {
            warn!("[请求 #{}] ❌ 没有可用的后端", request_id);
            return QueryOutcome::failed(OrchestrationError::NoBackendsAvailable.to_string());
        }

        let candidates = self.candidates(request_id, backend_override);

        let chunks = self.partitioner.partition(records);
        if chunks.is_empty() {
            warn!("[请求 #{}] ⚠️ 没有可分析的记录", request_id);
            return QueryOutcome::failed(OrchestrationError::NoRecords.to_string());
        }
        logging::log_chunks_planned(request_id, &chunks, candidates.len());

        let flow = Arc::new(ChunkFlow::new(
            self.registry.clone(),
            self.selector.clone(),
            self.config.max_attempts_per_chunk,
        ));
        let plan = DispatchPlan {
            request_id,
            prompt: Arc::from(prompt),
            candidates: Arc::from(candidates),
            max_concurrent: self.config.max_concurrent_chunks,
            deadline: self.config.request_deadline(),
        };
        let results = dispatch_chunks(flow, chunks.into_iter().map(Arc::new).collect(), plan).await;

        let success = ResponseAggregator::query_succeeded(&results);
        let combined_text = ResponseAggregator::combine(&results);
        let error_summary = ResponseAggregator::error_summary(&results);
        logging::print_final_stats(request_id, &results);

        QueryOutcome {
            success,
            combined_text,
            per_chunk_results: results,
            error_summary,
        }
    }

    fn candidates(&self, request_id: u64, backend_override: Option<&str>) -> Vec<BackendHandle> {
        match backend_override {
            Some(name) => match self.registry.find(name) {
                Some(handle) => {
                    info!("[请求 #{}] 📌 指定后端: {}", request_id, name);
                    vec![handle]
                }
                None => {
                    warn!(
                        "[请求 #{}] ⚠️ 指定的后端 {} 不可用，使用正常选择",
                        request_id, name
                    );
                    self.registry.list_healthy().to_vec()
                }
            },
            None => self.registry.list_healthy().to_vec(),
        }
    }

    pub fn list_healthy_backend_names(&self) -> Vec<String> {
        self.registry.healthy_names()
    }

    pub fn usage_snapshot(&self) -> HashMap<String, u64> {
        self.registry.usage_snapshot()
    }
}
