//! 后端注册表
//!
//! 启动时并发探测所有已配置的后端，只保留健康的后端，
//! 打乱一次顺序后在整个进程生命周期内只读使用。
//! 唯一可变的状态是每个后端的使用计数。

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::clients::{build_backend, BackendHandle, BackendTimeouts};
use crate::config::Config;

/// 健康后端集合 + 使用计数
pub struct BackendRegistry {
    healthy: Vec<BackendHandle>,
    usage: Mutex<HashMap<String, u64>>,
}

impl BackendRegistry {
    /// 根据配置创建所有后端并做健康检查
    ///
    /// 无法创建的后端（例如缺少 API key）会被跳过并记录警告。
    pub async fn initialize(config: &Config) -> Self {
        let timeouts = BackendTimeouts::from_config(config);

        let handles: Vec<BackendHandle> = config
            .backends
            .iter()
            .filter_map(|descriptor| match build_backend(descriptor, timeouts) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("⚠️ 跳过后端 {}: {}", descriptor.name, e);
                    None
                }
            })
            .collect();

        Self::from_handles(handles, config.selection_seed).await
    }

    /// 对已创建的句柄做并发健康检查
    ///
    /// `shuffle_seed` 为 `None` 时使用系统熵打乱顺序。
    pub async fn from_handles(handles: Vec<BackendHandle>, shuffle_seed: Option<u64>) -> Self {
        info!("🩺 正在检查 {} 个后端的连通性...", handles.len());

        let checks = handles.iter().map(|handle| handle.health_check());
        let results = join_all(checks).await;

        let mut healthy: Vec<BackendHandle> = handles
            .into_iter()
            .zip(results)
            .filter_map(|(handle, ok)| {
                if ok {
                    info!("✅ {} 可用", handle.name());
                    Some(handle)
                } else {
                    warn!("❌ {} 不可用，已排除", handle.name());
                    None
                }
            })
            .collect();

        let mut rng = match shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        healthy.shuffle(&mut rng);

        if healthy.is_empty() {
            warn!("⚠️ 没有可用的后端，所有查询都会直接失败");
        } else {
            info!(
                "✓ 可用后端 ({}): {}",
                healthy.len(),
                healthy.iter().map(|h| h.name()).collect::<Vec<_>>().join(", ")
            );
        }

        let usage = healthy.iter().map(|h| (h.name().to_string(), 0)).collect();
        Self {
            healthy,
            usage: Mutex::new(usage),
        }
    }

    pub fn list_healthy(&self) -> &[BackendHandle] {
        &self.healthy
    }

    pub fn healthy_names(&self) -> Vec<String> {
        self.healthy.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn find(&self, name: &str) -> Option<BackendHandle> {
        self.healthy.iter().find(|h| h.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.healthy.is_empty()
    }

    /// 使用计数加一
    pub fn record_usage(&self, name: &str) {
        *self.lock_usage().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn usage_snapshot(&self) -> HashMap<String, u64> {
        self.lock_usage().clone()
    }

    /// 持有计数锁，选择器在同一把锁内完成“读快照 → 选择 → 计数”
    pub(crate) fn lock_usage(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
