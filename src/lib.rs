//! # Sniff Recon
//!
//! 多后端 AI 流量分析编排：把超大的流量记录集切成分片，
//! 在多个可互换的 AI 后端之间加权自平衡地分配请求，
//! 分片并发执行并逐个故障转移，最后合并成一份分析结果。
//!
//! ## 架构设计
//!
//! ### ① 适配器层（Clients）
//! - `clients/` - 每家后端一个适配器，统一为 `AnalysisBackend` trait
//! - 所有错误都折叠进 `QueryResult`，不会越过适配器边界
//!
//! ### ② 业务能力层（Services）
//! - `BackendRegistry` - 启动时并发健康检查，保存使用计数
//! - `BackendSelector` - 加权自平衡 / 轮询选择
//! - `ChunkPartitioner` - 分片 + 摘要
//! - `ResponseAggregator` - 合并结果与性能统计
//!
//! ### ③ 流程层（Workflow）
//! - `ChunkCtx` - 上下文封装（请求编号 + 分片序号）
//! - `ChunkFlow` - 单个分片的故障转移流程
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/query_orchestrator` - 对外入口 `run_query`
//! - `orchestrator/chunk_dispatcher` - 分片并发调度

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

pub use utils::logging as logger;

// 重新导出常用类型
pub use clients::{build_backend, AnalysisBackend, BackendHandle, BackendTimeouts};
pub use config::Config;
pub use error::{AppError, AppResult, BackendError};
pub use models::{BackendDescriptor, BackendKind, QueryResult, TrafficRecord};
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use services::{BackendRegistry, BackendSelector, ChunkPartitioner, ResponseAggregator};
