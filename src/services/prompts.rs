//! 推荐的分析问题

const SUGGESTED_QUERIES: [&str; 10] = [
    "Analyze this network traffic for security threats and anomalies",
    "What are the most active IP addresses and what might they be doing?",
    "Identify any suspicious port usage or protocol patterns",
    "Look for signs of network scanning or reconnaissance",
    "Analyze the traffic for potential data exfiltration attempts",
    "What protocols are being used and are they appropriate for this network?",
    "Identify any unusual traffic patterns or timing anomalies",
    "Look for signs of malware communication or C&C traffic",
    "Analyze DNS requests for suspicious domains or patterns",
    "Check for any encrypted traffic that might be hiding malicious activity",
];

pub fn suggested_queries() -> &'static [&'static str] {
    &SUGGESTED_QUERIES
}

/// 默认问题（推荐列表的第一条）
pub fn default_query() -> &'static str {
    SUGGESTED_QUERIES[0]
}
