//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `query_orchestrator` - 查询编排器
//! - 持有注册表和选择器，管理整个进程的后端状态
//! - 切分记录、启动调度、汇总结果
//!
//! ### `chunk_dispatcher` - 分片并发调度器
//! - 每个分片一个任务，Semaphore 限制并发
//! - 任务异常和整体截止时间的兜底
//!
//! ## 层次关系
//!
//! ```text
//! query_orchestrator (处理一次查询)
//!     ↓
//! chunk_dispatcher (处理 Vec<RecordChunk>)
//!     ↓
//! workflow::ChunkFlow (处理单个分片，故障转移)
//!     ↓
//! services (能力层：registry / selector / digest / aggregator)
//!     ↓
//! clients (各家后端适配器)
//! ```

pub mod chunk_dispatcher;
pub mod query_orchestrator;

pub use chunk_dispatcher::{dispatch_chunks, DispatchPlan};
pub use query_orchestrator::{QueryOrchestrator, QueryOutcome};
