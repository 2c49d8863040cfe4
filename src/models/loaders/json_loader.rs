use crate::error::AppError;
use crate::models::record::TrafficRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 JSON 文件加载已解码的流量记录（顶层为记录数组）
pub async fn load_records_from_json(json_file_path: &Path) -> Result<Vec<TrafficRecord>> {
    let content = fs::read_to_string(json_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(json_file_path.display().to_string(), e))?;

    let records: Vec<TrafficRecord> = serde_json::from_str(&content)
        .with_context(|| format!("无法解析记录文件: {}", json_file_path.display()))?;

    Ok(records)
}

/// 从文件夹中加载所有 JSON 记录文件，按文件名排序后拼接成一个记录集
///
/// 单个文件解析失败只记录警告，不影响其他文件。
pub async fn load_all_record_files(folder_path: &str) -> Result<Vec<TrafficRecord>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut json_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            json_files.push(path);
        }
    }
    json_files.sort();

    let mut all_records = Vec::new();
    for path in json_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_records_from_json(&path).await {
            Ok(records) => {
                tracing::info!("成功加载 {} 条记录", records.len());
                all_records.extend(records);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(all_records)
}
