//! 后端选择器
//!
//! ## 策略
//!
//! - **加权自平衡**（默认）：每个后端有目标占比。还没有任何使用记录时，
//!   按目标占比随机抽样；之后选择 `目标占比 - 实际占比 + 抖动` 最高的后端，
//!   实际占比偏低的后端会被优先补齐。
//! - **轮询**：按当前轮转顺序取第一个未排除的后端；没有排除项时把它移到队尾。
//!
//! 选中后立即在注册表中把该后端的使用计数加一。

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::clients::BackendHandle;
use crate::config::Config;
use crate::services::registry::BackendRegistry;

/// 抖动上限（百分点），只用于打破平局
const JITTER_PERCENT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    Weighted,
    RoundRobin,
}

pub struct BackendSelector {
    policy: SelectionPolicy,
    weights: HashMap<String, f64>,
    rotate: bool,
    rotation: Mutex<VecDeque<String>>,
    rng: Mutex<StdRng>,
}

impl BackendSelector {
    pub fn new(config: &Config) -> Self {
        let policy = if config.use_weighted_balancing {
            SelectionPolicy::Weighted
        } else {
            SelectionPolicy::RoundRobin
        };
        Self::with_policy(policy, config.backend_weights.clone(), config.selection_seed)
            .rotating(config.rotate_round_robin)
    }

    pub fn with_policy(
        policy: SelectionPolicy,
        weights: HashMap<String, f64>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            policy,
            weights,
            rotate: true,
            rotation: Mutex::new(VecDeque::new()),
            rng: Mutex::new(rng),
        }
    }

    /// 设置轮询模式下是否轮转
    pub fn rotating(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    /// 从候选中选择一个未被排除的后端，没有可选时返回 `None`
    pub fn select(
        &self,
        registry: &BackendRegistry,
        candidates: &[BackendHandle],
        excluded: &HashSet<String>,
    ) -> Option<BackendHandle> {
        let eligible: Vec<&BackendHandle> = candidates
            .iter()
            .filter(|h| !excluded.contains(h.name()))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        // 快照、选择、计数在同一把锁内完成
        let mut usage = registry.lock_usage();
        let chosen = match self.policy {
            SelectionPolicy::Weighted => self.pick_weighted(&eligible, &usage),
            SelectionPolicy::RoundRobin => self.pick_round_robin(&eligible, excluded.is_empty()),
        }?;

        *usage.entry(chosen.name().to_string()).or_insert(0) += 1;
        debug!("🎯 选择后端: {} ({:?})", chosen.name(), self.policy);
        Some(chosen)
    }

    /// 在合格候选上归一化后的目标占比
    fn target_percents(&self, eligible: &[&BackendHandle]) -> Vec<f64> {
        let even_share = 100.0 / eligible.len() as f64;
        let raw: Vec<f64> = eligible
            .iter()
            .map(|h| self.weights.get(h.name()).copied().unwrap_or(even_share).max(0.0))
            .collect();

        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.iter().map(|w| w / total * 100.0).collect()
        } else {
            vec![even_share; eligible.len()]
        }
    }

    fn pick_weighted(
        &self,
        eligible: &[&BackendHandle],
        usage: &HashMap<String, u64>,
    ) -> Option<BackendHandle> {
        let targets = self.target_percents(eligible);
        let counts: Vec<u64> = eligible
            .iter()
            .map(|h| usage.get(h.name()).copied().unwrap_or(0))
            .collect();
        let total_usage: u64 = counts.iter().sum();

        let mut rng = self.lock_rng();

        if total_usage == 0 {
            let index = match WeightedIndex::new(&targets) {
                Ok(dist) => dist.sample(&mut *rng),
                Err(_) => rng.gen_range(0..eligible.len()),
            };
            return Some(eligible[index].clone());
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, (target, count)) in targets.iter().zip(&counts).enumerate() {
            let actual = *count as f64 / total_usage as f64 * 100.0;
            let score = target - actual + rng.gen_range(0.0..JITTER_PERCENT);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| eligible[index].clone())
    }

    fn pick_round_robin(
        &self,
        eligible: &[&BackendHandle],
        unrestricted: bool,
    ) -> Option<BackendHandle> {
        let mut rotation = self.rotation.lock().unwrap_or_else(|p| p.into_inner());

        // 第一次见到的后端追加到轮转队尾
        for handle in eligible {
            if !rotation.iter().any(|name| name == handle.name()) {
                rotation.push_back(handle.name().to_string());
            }
        }

        let position = rotation
            .iter()
            .position(|name| eligible.iter().any(|h| h.name() == name))?;
        let name = rotation[position].clone();
        let chosen = eligible.iter().find(|h| h.name() == name).map(|h| (*h).clone())?;

        if unrestricted && self.rotate {
            rotation.remove(position);
            rotation.push_back(name);
        }
        Some(chosen)
    }

    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|p| p.into_inner())
    }
}
