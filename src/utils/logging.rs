//! 日志工具模块
//!
//! 提供日志初始化和格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::chunk::RecordChunk;
use crate::models::query_result::QueryResult;
use crate::services::PerformanceSummary;

/// 初始化 tracing，`RUST_LOG` 未设置时默认 info
///
/// 重复调用是安全的，只有第一次生效。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 多后端 AI 流量分析启动");
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🔌 已配置后端: {}", config.backends.len());
    for backend in &config.backends {
        match config.weight_for(&backend.name) {
            Some(weight) => info!("   - {} ({}) 目标占比 {:.0}%", backend.name, backend.model, weight),
            None => info!("   - {} ({}) 目标占比: 平均分配", backend.name, backend.model),
        }
    }
    info!(
        "⚖️ 选择策略: {}",
        if config.use_weighted_balancing {
            "加权自平衡"
        } else {
            "轮询"
        }
    );
    info!(
        "📦 分片上限: {:.1} MB / {} 条",
        config.chunk_size_mb, config.max_records_per_chunk
    );
    match config.max_concurrent_chunks {
        Some(limit) => info!("📊 最大并发分片: {}", limit),
        None => info!("📊 最大并发分片: 不限"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录分片计划
pub fn log_chunks_planned(request_id: u64, chunks: &[RecordChunk], backend_count: usize) {
    let total_records: usize = chunks.iter().map(|c| c.record_count).sum();
    info!("\n{}", "─".repeat(60));
    info!(
        "[请求 #{}] 📦 {} 条记录切分为 {} 个分片，候选后端 {} 个",
        request_id,
        total_records,
        chunks.len(),
        backend_count
    );
    for chunk in chunks {
        info!(
            "[请求 #{}]   分片 {} (ID#{}): {} 条, ~{:.2} MB",
            request_id,
            chunk.index + 1,
            chunk.chunk_id,
            chunk.record_count,
            chunk.size_mb()
        );
    }
    info!("{}", "─".repeat(60));
}

/// 打印一次请求的最终统计
pub fn print_final_stats(request_id: u64, results: &[QueryResult]) {
    let success = results.iter().filter(|r| r.is_success()).count();
    let summary = PerformanceSummary::from_results(results);

    info!("\n{}", "=".repeat(60));
    info!("[请求 #{}] 📊 处理完成统计", request_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, results.len());
    info!("❌ 失败: {}", results.len() - success);
    info!("⏱️ 后端耗时合计: {:.2}s", summary.total_elapsed.as_secs_f64());
    info!("🔢 Token 合计: {}", summary.total_tokens);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
