//! 记录分片与分片摘要

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::record::TrafficRecord;

/// 分片的统计摘要
///
/// 发送给后端的上下文只由摘要生成，原始记录不会离开本进程。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkDigest {
    pub total_records: usize,
    /// 协议名 → 记录数，所有记录都会计入（未知协议计入 "Other"）
    pub protocols: BTreeMap<String, usize>,
    pub src_addrs: HashMap<String, usize>,
    pub dst_addrs: HashMap<String, usize>,
    /// TCP 目的端口 → 次数
    pub tcp_ports: BTreeMap<u16, usize>,
    /// UDP 目的端口 → 次数
    pub udp_ports: BTreeMap<u16, usize>,
    /// 已去重，保持首次出现的顺序
    pub suspicious_patterns: Vec<String>,
    pub size_stats: SizeStats,
}

/// 记录长度统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SizeStats {
    pub total_bytes: u64,
    pub min_bytes: u32,
    pub max_bytes: u32,
}

impl SizeStats {
    pub fn average(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / count as f64
        }
    }
}

impl ChunkDigest {
    /// 按次数降序（同次数按地址升序）取前 `n` 个源地址
    pub fn top_sources(&self, n: usize) -> Vec<(&str, usize)> {
        top_n(&self.src_addrs, n)
    }

    /// 按次数降序（同次数按地址升序）取前 `n` 个目的地址
    pub fn top_destinations(&self, n: usize) -> Vec<(&str, usize)> {
        top_n(&self.dst_addrs, n)
    }
}

fn top_n(tally: &HashMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = tally.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(n);
    entries
}

/// 输入记录集的一个有界分片
///
/// 由分片器创建，调度层只读使用，创建后不再修改。
#[derive(Debug, Clone, Serialize)]
pub struct RecordChunk {
    pub chunk_id: String,
    /// 分片序号（从 0 开始）
    pub index: usize,
    pub records: Vec<TrafficRecord>,
    pub digest: ChunkDigest,
    pub estimated_bytes: u64,
    pub record_count: usize,
}

impl RecordChunk {
    /// 估算大小（MB）
    pub fn size_mb(&self) -> f64 {
        self.estimated_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_sources_orders_by_count_then_address() {
        let mut digest = ChunkDigest::default();
        digest.src_addrs.insert("10.0.0.3".into(), 5);
        digest.src_addrs.insert("10.0.0.1".into(), 5);
        digest.src_addrs.insert("10.0.0.2".into(), 9);
        digest.src_addrs.insert("10.0.0.4".into(), 1);

        let top = digest.top_sources(3);
        assert_eq!(top, vec![("10.0.0.2", 9), ("10.0.0.1", 5), ("10.0.0.3", 5)]);
    }

    #[test]
    fn test_average_size_of_empty_stats() {
        assert_eq!(SizeStats::default().average(0), 0.0);
    }
}
