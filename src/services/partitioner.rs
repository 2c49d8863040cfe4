//! 记录分片器
//!
//! 按大小上限和记录数上限把记录集切成连续、不重叠、非空的分片。
//! 大小按 `记录数 × 单条平均字节数` 估算。

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{Config, DEFAULT_AVERAGE_RECORD_BYTES};
use crate::models::chunk::RecordChunk;
use crate::models::record::TrafficRecord;
use crate::services::digest::compute_digest;

/// 分片器配置
#[derive(Debug, Clone, Copy)]
pub struct ChunkPartitioner {
    pub size_ceiling_bytes: u64,
    pub count_ceiling: usize,
    pub average_record_bytes: u64,
}

impl ChunkPartitioner {
    pub fn new(size_ceiling_bytes: u64, count_ceiling: usize) -> Self {
        Self {
            size_ceiling_bytes,
            count_ceiling,
            average_record_bytes: DEFAULT_AVERAGE_RECORD_BYTES,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.chunk_size_bytes(), config.max_records_per_chunk)
            .with_average_record_bytes(config.average_record_bytes)
    }

    pub fn with_average_record_bytes(mut self, bytes: u64) -> Self {
        self.average_record_bytes = bytes;
        self
    }

    /// 单个分片最多能放多少条记录（至少 1 条）
    fn records_limit(&self) -> usize {
        let by_size = if self.average_record_bytes == 0 {
            usize::MAX
        } else {
            (self.size_ceiling_bytes / self.average_record_bytes) as usize
        };
        self.count_ceiling.min(by_size).max(1)
    }

    /// 切分记录集，空输入返回空列表
    pub fn partition(&self, records: &[TrafficRecord]) -> Vec<RecordChunk> {
        let total = records.len();
        if total == 0 {
            return Vec::new();
        }

        let estimated = total as u64 * self.average_record_bytes;
        if estimated <= self.size_ceiling_bytes && total <= self.count_ceiling {
            return vec![build_chunk(0, 1, records, self.average_record_bytes)];
        }

        let by_size = if self.size_ceiling_bytes == 0 {
            total
        } else {
            estimated.div_ceil(self.size_ceiling_bytes) as usize
        };
        let by_count = total.div_ceil(self.count_ceiling.max(1));
        let by_limit = total.div_ceil(self.records_limit());

        let chunk_count = by_size.max(by_count).max(by_limit).clamp(1, total);
        let per_chunk = total.div_ceil(chunk_count);

        // 按 per_chunk 取整后实际分片数可能少于 chunk_count
        let slices: Vec<&[TrafficRecord]> = records.chunks(per_chunk).collect();
        let actual_count = slices.len();
        let chunks: Vec<RecordChunk> = slices
            .into_iter()
            .enumerate()
            .map(|(index, slice)| build_chunk(index, actual_count, slice, self.average_record_bytes))
            .collect();

        debug!(
            "📦 {} 条记录切分为 {} 个分片（每片最多 {} 条）",
            total,
            chunks.len(),
            per_chunk
        );
        chunks
    }
}

/// 按给定上限切分，使用默认的单条记录字节数
pub fn partition(
    records: &[TrafficRecord],
    size_ceiling_bytes: u64,
    count_ceiling: usize,
) -> Vec<RecordChunk> {
    ChunkPartitioner::new(size_ceiling_bytes, count_ceiling).partition(records)
}

/// 分片 ID：`chunk_{index}_{count}` 的 SHA-256 前 8 位十六进制
pub fn chunk_id(index: usize, count: usize) -> String {
    let hash = Sha256::digest(format!("chunk_{}_{}", index, count).as_bytes());
    hex::encode(hash)[..8].to_string()
}

fn build_chunk(
    index: usize,
    chunk_count: usize,
    slice: &[TrafficRecord],
    average_record_bytes: u64,
) -> RecordChunk {
    RecordChunk {
        chunk_id: chunk_id(index, chunk_count),
        index,
        records: slice.to_vec(),
        digest: compute_digest(slice),
        estimated_bytes: slice.len() as u64 * average_record_bytes,
        record_count: slice.len(),
    }
}
