//! 结果汇总
//!
//! 把各分片的结果合并成一段文本：成功分片逐个列出，失败只给出数量，
//! 最后附上性能统计。

use std::collections::BTreeSet;
use std::fmt::Write;
use std::time::Duration;

use crate::models::query_result::QueryResult;

/// 所有分片都失败时返回的固定提示
pub const ALL_FAILED_BANNER: &str =
    "❌ Analysis failed for all chunks. Please check your AI backend connections.";

/// 成功分片的性能统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub total_elapsed: Duration,
    pub total_tokens: u64,
    /// 去重并排序后的后端名称
    pub backends: Vec<String>,
}

impl PerformanceSummary {
    pub fn from_results(results: &[QueryResult]) -> Self {
        let successes = results.iter().filter(|r| r.is_success());

        let mut summary = Self::default();
        let mut backends = BTreeSet::new();
        for result in successes {
            summary.total_elapsed += result.elapsed().unwrap_or_default();
            summary.total_tokens += result.tokens_used().unwrap_or(0);
            if let Some(name) = result.backend() {
                backends.insert(name.to_string());
            }
        }
        summary.backends = backends.into_iter().collect();
        summary
    }
}

pub struct ResponseAggregator;

impl ResponseAggregator {
    /// 合并所有分片结果
    pub fn combine(results: &[QueryResult]) -> String {
        let successes: Vec<&QueryResult> = results.iter().filter(|r| r.is_success()).collect();
        let failed = results.len() - successes.len();

        if successes.is_empty() {
            return ALL_FAILED_BANNER.to_string();
        }

        let mut combined = String::new();
        let _ = write!(
            combined,
            "🔍 **Multi-Chunk Analysis Summary** ({}/{} chunks analyzed successfully)\n\n",
            successes.len(),
            results.len()
        );

        for (k, result) in successes.iter().enumerate() {
            let _ = write!(
                combined,
                "### Chunk {} Analysis ({}):\n{}\n\n---\n\n",
                k + 1,
                result.backend().unwrap_or("unknown"),
                result.response()
            );
        }

        if failed > 0 {
            let _ = writeln!(
                combined,
                "⚠️ **Note**: {} chunks failed to analyze due to errors.",
                failed
            );
        }

        let summary = PerformanceSummary::from_results(results);
        let _ = writeln!(combined, "\n📊 **Performance Summary**:");
        let _ = writeln!(
            combined,
            "- Total processing time: {:.2} seconds",
            summary.total_elapsed.as_secs_f64()
        );
        let _ = writeln!(combined, "- Total tokens used: {}", summary.total_tokens);
        let _ = writeln!(combined, "- Backends used: {}", summary.backends.join(", "));

        combined
    }

    /// 至少一个分片成功即视为整体成功
    pub fn query_succeeded(results: &[QueryResult]) -> bool {
        results.iter().any(QueryResult::is_success)
    }

    /// 失败分片的错误汇总，没有失败时返回 `None`
    pub fn error_summary(results: &[QueryResult]) -> Option<String> {
        let errors: Vec<String> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| match r.chunk_id() {
                Some(id) => format!("[{}] {}", id, r.error().unwrap_or("unknown error")),
                None => r.error().unwrap_or("unknown error").to_string(),
            })
            .collect();
        if errors.is_empty() {
            None
        } else {
            Some(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(backend: &str, text: &str, tokens: u64, millis: u64) -> QueryResult {
        QueryResult::success(backend, text, Some(tokens), Duration::from_millis(millis))
    }

    fn failed(error: &str) -> QueryResult {
        QueryResult::failure(None, error)
    }

    #[test]
    fn test_no_success_gives_banner() {
        assert_eq!(ResponseAggregator::combine(&[]), ALL_FAILED_BANNER);
        assert!(!ResponseAggregator::query_succeeded(&[]));

        let all_failed = vec![failed("a"), failed("b")];
        assert_eq!(ResponseAggregator::combine(&all_failed), ALL_FAILED_BANNER);
        assert!(!ResponseAggregator::query_succeeded(&all_failed));
    }

    #[test]
    fn test_partial_success_lists_sections_and_failures() {
        let results = vec![
            ok("OpenAI", "port scan from 10.0.0.5", 120, 1500),
            failed("Groq: HTTP 500: boom"),
            ok("Groq", "nothing unusual", 80, 500),
        ];
        assert!(ResponseAggregator::query_succeeded(&results));

        let text = ResponseAggregator::combine(&results);
        assert!(text.starts_with("🔍 **Multi-Chunk Analysis Summary** (2/3 chunks analyzed successfully)"));
        assert!(text.contains("### Chunk 1 Analysis (OpenAI):\nport scan from 10.0.0.5"));
        assert!(text.contains("### Chunk 2 Analysis (Groq):\nnothing unusual"));
        assert!(text.contains("⚠️ **Note**: 1 chunks failed to analyze due to errors."));
        assert!(text.contains("- Total processing time: 2.00 seconds"));
        assert!(text.contains("- Total tokens used: 200"));
        assert!(text.contains("- Backends used: Groq, OpenAI"));
    }

    #[test]
    fn test_no_failure_note_when_all_succeed() {
        let text = ResponseAggregator::combine(&[ok("Ollama", "fine", 10, 10)]);
        assert!(!text.contains("**Note**"));
        assert!(text.contains("(1/1 chunks analyzed successfully)"));
    }

    #[test]
    fn test_performance_summary_ignores_failures() {
        let results = vec![
            ok("Groq", "a", 5, 100),
            failed("x").with_elapsed(Duration::from_secs(30)),
            ok("Groq", "b", 7, 200),
        ];
        let summary = PerformanceSummary::from_results(&results);
        assert_eq!(summary.total_tokens, 12);
        assert_eq!(summary.total_elapsed, Duration::from_millis(300));
        assert_eq!(summary.backends, vec!["Groq"]);
    }

    #[test]
    fn test_error_summary_tags_chunk_ids() {
        let results = vec![ok("Groq", "a", 1, 1), failed("boom").with_chunk_id("deadbeef")];
        assert_eq!(
            ResponseAggregator::error_summary(&results).as_deref(),
            Some("[deadbeef] boom")
        );
        assert_eq!(ResponseAggregator::error_summary(&results[..1]), None);
    }
}
