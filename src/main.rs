use anyhow::{Context, Result};
use std::path::Path;

use sniff_recon::logger;
use sniff_recon::models::{load_config_toml, load_records_from_json};
use sniff_recon::services::prompts;
use sniff_recon::{Config, QueryOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：优先 CONFIG_FILE，否则读环境变量
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => load_config_toml(Path::new(&path)).await?,
        Err(_) => Config::from_env(),
    };

    logger::init(config.verbose_logging);

    let records_file = std::env::var("RECORDS_FILE").context("未设置 RECORDS_FILE")?;
    let records = load_records_from_json(Path::new(&records_file)).await?;

    let prompt = std::env::var("QUERY_PROMPT")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| prompts::default_query().to_string());
    let backend_override = std::env::var("BACKEND_OVERRIDE").ok();

    let orchestrator = QueryOrchestrator::initialize(config).await?;
    tracing::info!("❓ 问题: {}", logger::truncate_text(&prompt, 80));

    let outcome = orchestrator
        .run_query(&prompt, &records, backend_override.as_deref())
        .await;

    println!("{}", outcome.combined_text);

    if !outcome.success {
        anyhow::bail!("分析失败: {}", outcome.error_summary.unwrap_or_default());
    }

    Ok(())
}
