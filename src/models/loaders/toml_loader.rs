use crate::config::Config;
use crate::error::AppError;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载配置，未出现的字段使用默认值
///
/// ```toml
/// use_weighted_balancing = true
/// max_records_per_chunk = 5000
///
/// [backend_weights]
/// Groq = 30.0
///
/// [[backends]]
/// name = "Groq"
/// kind = "groq"
/// api_key = "gsk_..."
/// model = "llama-3.3-70b-versatile"
/// max_output_tokens = 8192
/// ```
pub async fn load_config_toml(toml_file_path: &Path) -> Result<Config> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(toml_file_path.display().to_string(), e))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("无法解析配置文件: {}", toml_file_path.display()))?;

    config
        .validate()
        .with_context(|| format!("配置文件校验失败: {}", toml_file_path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::BackendKind;

    #[tokio::test]
    async fn test_load_config_toml() {
        let path = std::env::temp_dir().join(format!("sniff_recon_config_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
use_weighted_balancing = false
max_records_per_chunk = 2000

[backend_weights]
Local = 10.0

[[backends]]
name = "Local"
kind = "ollama"
model = "llama3"
max_output_tokens = 2048
"#,
        )
        .unwrap();

        let config = load_config_toml(&path).await.unwrap();
        assert!(!config.use_weighted_balancing);
        assert_eq!(config.max_records_per_chunk, 2000);
        assert_eq!(config.query_timeout_secs, 60);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].kind, BackendKind::Ollama);
        assert_eq!(config.weight_for("Local"), Some(10.0));

        std::fs::remove_file(&path).ok();
    }
}
