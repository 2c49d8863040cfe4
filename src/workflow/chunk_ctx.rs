//! 分片处理上下文
//!
//! 封装"我正在处理哪次请求的第几个分片"这一信息

use std::fmt::Display;

/// 分片处理上下文
#[derive(Debug, Clone)]
pub struct ChunkCtx {
    /// 请求编号（仅用于日志）
    pub request_id: u64,

    /// 分片序号（从1开始）
    pub chunk_index: usize,

    /// 分片总数
    pub chunk_total: usize,

    pub chunk_id: String,
}

impl ChunkCtx {
    pub fn new(request_id: u64, chunk_index: usize, chunk_total: usize, chunk_id: String) -> Self {
        Self {
            request_id,
            chunk_index,
            chunk_total,
            chunk_id,
        }
    }
}

impl Display for ChunkCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[请求 #{} 分片 {}/{} ID#{}]",
            self.request_id, self.chunk_index, self.chunk_total, self.chunk_id
        )
    }
}
