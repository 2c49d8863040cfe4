//! 分片摘要
//!
//! 一次线性遍历得到协议、地址、端口统计和可疑模式，
//! 再把摘要渲染成发给后端的上下文文本。

use phf::phf_set;
use std::collections::HashMap;
use std::fmt::Write;

use crate::models::chunk::{ChunkDigest, RecordChunk, SizeStats};
use crate::models::record::{Protocol, TrafficRecord};

/// 单个源地址 SYN 数超过该值即视为疑似 SYN flood
pub const SYN_FLOOD_THRESHOLD: usize = 50;

static SUSPICIOUS_TCP_PORTS: phf::Set<u16> = phf_set! { 0u16, 65535u16, 31337u16, 6667u16 };
static SUSPICIOUS_UDP_PORTS: phf::Set<u16> = phf_set! { 0u16, 65535u16, 31337u16 };

const TOP_ADDRESSES: usize = 5;
const MAX_PATTERNS_IN_CONTEXT: usize = 10;

/// 计算一组记录的摘要
pub fn compute_digest(records: &[TrafficRecord]) -> ChunkDigest {
    let mut digest = ChunkDigest {
        total_records: records.len(),
        ..ChunkDigest::default()
    };
    let mut syn_counts: HashMap<&str, usize> = HashMap::new();
    let mut patterns: Vec<String> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let src = record.src_addr.as_str();

        *digest
            .protocols
            .entry(record.protocol.tally_name().to_string())
            .or_insert(0) += 1;
        *digest.src_addrs.entry(record.src_addr.clone()).or_insert(0) += 1;
        *digest.dst_addrs.entry(record.dst_addr.clone()).or_insert(0) += 1;

        match (record.protocol, record.dst_port) {
            (Protocol::Tcp, Some(port)) => {
                *digest.tcp_ports.entry(port).or_insert(0) += 1;
                if SUSPICIOUS_TCP_PORTS.contains(&port) {
                    patterns.push(format!("Suspicious TCP port {} from {}", port, src));
                }
            }
            (Protocol::Udp, Some(port)) => {
                *digest.udp_ports.entry(port).or_insert(0) += 1;
                if SUSPICIOUS_UDP_PORTS.contains(&port) {
                    patterns.push(format!("Suspicious UDP port {} from {}", port, src));
                }
            }
            _ => {}
        }

        if record.is_syn() {
            let count = syn_counts.entry(src).or_insert(0);
            *count += 1;
            if *count == SYN_FLOOD_THRESHOLD + 1 {
                patterns.push(format!("Potential SYN flood from {}", src));
            }
        }

        digest.size_stats = accumulate(digest.size_stats, record.length, i == 0);
    }

    digest.suspicious_patterns = dedup_preserving_order(patterns);
    digest
}

fn accumulate(stats: SizeStats, length: u32, first: bool) -> SizeStats {
    SizeStats {
        total_bytes: stats.total_bytes + u64::from(length),
        min_bytes: if first { length } else { stats.min_bytes.min(length) },
        max_bytes: stats.max_bytes.max(length),
    }
}

fn dedup_preserving_order(patterns: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    patterns
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// 把分片摘要渲染成上下文文本
pub fn render_context(chunk: &RecordChunk) -> String {
    let digest = &chunk.digest;
    let mut context = String::new();

    // 写入 String 不会失败
    let _ = writeln!(context, "TRAFFIC CHUNK ANALYSIS (ID: {})", chunk.chunk_id);
    let _ = writeln!(context, "{}", "=".repeat(41));
    let _ = writeln!(context);
    let _ = writeln!(context, "Basic Statistics:");
    let _ = writeln!(context, "- Total Records: {}", digest.total_records);
    let _ = writeln!(context, "- Chunk Size: {:.2} MB", chunk.size_mb());
    let _ = writeln!(
        context,
        "- Average Record Size: {:.1} bytes",
        digest.size_stats.average(digest.total_records)
    );

    let _ = writeln!(context, "\nProtocol Distribution:");
    for (protocol, count) in &digest.protocols {
        let _ = writeln!(context, "- {}: {} records", protocol, count);
    }

    let _ = writeln!(context, "\nTop Source Addresses:");
    for (addr, count) in digest.top_sources(TOP_ADDRESSES) {
        let _ = writeln!(context, "- {}: {} records", addr, count);
    }

    let _ = writeln!(context, "\nTop Destination Addresses:");
    for (addr, count) in digest.top_destinations(TOP_ADDRESSES) {
        let _ = writeln!(context, "- {}: {} records", addr, count);
    }

    if !digest.suspicious_patterns.is_empty() {
        let _ = writeln!(context, "\nSuspicious Patterns Detected:");
        for pattern in digest.suspicious_patterns.iter().take(MAX_PATTERNS_IN_CONTEXT) {
            let _ = writeln!(context, "- {}", pattern);
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::TCP_FLAG_SYN;

    fn tcp(src: &str, dst_port: u16) -> TrafficRecord {
        TrafficRecord::new(src, "10.0.0.1", Protocol::Tcp, 60).with_ports(40000, dst_port)
    }

    #[test]
    fn test_tallies_cover_every_record() {
        let records = vec![
            tcp("192.168.1.2", 443),
            TrafficRecord::new("192.168.1.3", "8.8.8.8", Protocol::Udp, 80).with_ports(5353, 53),
            TrafficRecord::new("192.168.1.3", "10.0.0.1", Protocol::Icmp, 98),
            TrafficRecord::new("192.168.1.4", "10.0.0.1", Protocol::Other(47), 120),
        ];
        let digest = compute_digest(&records);

        assert_eq!(digest.total_records, 4);
        assert_eq!(digest.protocols.values().sum::<usize>(), 4);
        assert_eq!(digest.protocols.get("Other"), Some(&1));
        assert_eq!(digest.tcp_ports.get(&443), Some(&1));
        assert_eq!(digest.udp_ports.get(&53), Some(&1));
        assert_eq!(digest.src_addrs.get("192.168.1.3"), Some(&2));
        assert_eq!(digest.size_stats.min_bytes, 60);
        assert_eq!(digest.size_stats.max_bytes, 120);
        assert_eq!(digest.size_stats.total_bytes, 358);
        assert!(digest.suspicious_patterns.is_empty());
    }

    #[test]
    fn test_suspicious_ports_are_deduplicated() {
        let records = vec![
            tcp("10.1.1.1", 31337),
            tcp("10.1.1.1", 31337),
            tcp("10.1.1.1", 6667),
            TrafficRecord::new("10.1.1.2", "10.0.0.1", Protocol::Udp, 64).with_ports(1, 6667),
            TrafficRecord::new("10.1.1.2", "10.0.0.1", Protocol::Udp, 64).with_ports(1, 0),
        ];
        let digest = compute_digest(&records);

        assert_eq!(
            digest.suspicious_patterns,
            vec![
                "Suspicious TCP port 31337 from 10.1.1.1",
                "Suspicious TCP port 6667 from 10.1.1.1",
                "Suspicious UDP port 0 from 10.1.1.2",
            ]
        );
    }

    #[test]
    fn test_syn_flood_needs_more_than_threshold() {
        let syn = |src: &str| tcp(src, 80).with_flags(TCP_FLAG_SYN);

        let at_threshold: Vec<_> = (0..SYN_FLOOD_THRESHOLD).map(|_| syn("10.9.9.9")).collect();
        assert!(compute_digest(&at_threshold).suspicious_patterns.is_empty());

        let over: Vec<_> = (0..SYN_FLOOD_THRESHOLD + 20).map(|_| syn("10.9.9.9")).collect();
        assert_eq!(
            compute_digest(&over).suspicious_patterns,
            vec!["Potential SYN flood from 10.9.9.9"]
        );
    }

    #[test]
    fn test_render_context_lists_top_addresses_and_patterns() {
        let mut records: Vec<_> = (0..7)
            .map(|i| tcp(&format!("172.16.0.{}", i), 443))
            .collect();
        records.push(tcp("172.16.0.1", 31337));
        let digest = compute_digest(&records);
        let chunk = RecordChunk {
            chunk_id: "abcd1234".into(),
            index: 0,
            record_count: records.len(),
            estimated_bytes: 8 * 1500,
            records,
            digest,
        };

        let context = render_context(&chunk);
        assert!(context.contains("(ID: abcd1234)"));
        assert!(context.contains("- Total Records: 8"));
        assert!(context.contains("- TCP: 8 records"));
        assert!(context.contains("- 172.16.0.1: 2 records"));
        assert!(context.contains("Suspicious TCP port 31337 from 172.16.0.1"));

        let source_lines = context
            .split("Top Source Addresses:")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .map(|block| block.lines().filter(|l| l.starts_with("- ")).count());
        assert_eq!(source_lines, Some(5));
    }
}
