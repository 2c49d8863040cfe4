//! 已解码的流量记录
//!
//! 由外部解码器产出，本 crate 只读取其中的字段。

use serde::{Deserialize, Serialize};
use std::fmt;

/// TCP SYN 标志位
pub const TCP_FLAG_SYN: u8 = 0x02;

/// 传输层协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// 其他协议，携带 IP 协议号
    Other(u8),
}

impl Protocol {
    /// 统计时使用的协议名称，未知协议统一归为 "Other"
    pub fn tally_name(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Other(_) => "Other",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Other(n) => write!(f, "Other({})", n),
            p => f.write_str(p.tally_name()),
        }
    }
}

/// 单条流量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub src_addr: String,
    pub dst_addr: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    /// TCP 标志位（仅 TCP 记录有值）
    #[serde(default)]
    pub tcp_flags: Option<u8>,
    /// 捕获时间戳（秒）
    #[serde(default)]
    pub timestamp: f64,
    /// 记录长度（字节）
    pub length: u32,
}

impl TrafficRecord {
    /// 创建一条不带端口信息的记录
    pub fn new(
        src_addr: impl Into<String>,
        dst_addr: impl Into<String>,
        protocol: Protocol,
        length: u32,
    ) -> Self {
        Self {
            src_addr: src_addr.into(),
            dst_addr: dst_addr.into(),
            protocol,
            src_port: None,
            dst_port: None,
            tcp_flags: None,
            timestamp: 0.0,
            length,
        }
    }

    /// 设置端口
    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    /// 设置 TCP 标志位
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.tcp_flags = Some(flags);
        self
    }

    /// 设置时间戳
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 是否为 SYN 报文
    pub fn is_syn(&self) -> bool {
        self.protocol == Protocol::Tcp
            && self.tcp_flags.is_some_and(|flags| flags & TCP_FLAG_SYN != 0)
    }
}
